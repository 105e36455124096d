//! Inventory integration tests: codes, ledger-derived stock, hash chains.

use std::path::Path;
use std::thread;

use chrono::NaiveDate;
use proptest::prelude::*;

use clinic_core::db::Database;
use clinic_core::inventory::{current_stock, stock_status, Inventory, NewMedicine, StockError};
use clinic_core::models::{
    Category, InventoryMovement, Medicine, MovementKind, Role, StockStatus, Supplier, UserProfile,
};
use clinic_core::ClinicError;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

fn admin() -> UserProfile {
    UserProfile::new("admin".into(), Role::Admin)
}

fn doctor() -> UserProfile {
    UserProfile::new("dr.mora".into(), Role::Doctor)
}

fn catalog(db: &Database) -> (Category, Supplier) {
    let category = Category::new("Analgésicos".into());
    db.insert_category(&category).unwrap();
    let supplier = Supplier::new("Droguería Central".into());
    db.insert_supplier(&supplier).unwrap();
    (category, supplier)
}

fn create(db: &Database, name: &str, minimum_stock: i64) -> Medicine {
    let (category, supplier) = match (db.list_categories().unwrap().pop(), db.list_suppliers().unwrap().pop()) {
        (Some(c), Some(s)) => (c, s),
        _ => catalog(db),
    };
    Inventory::with_today(db, today())
        .create_medicine(
            &admin(),
            NewMedicine {
                name: name.into(),
                description: None,
                category_id: category.id,
                supplier_id: supplier.id,
                unit_price_cents: 180,
                minimum_stock,
                code: None,
            },
        )
        .unwrap()
}

#[test]
fn test_codes_follow_creation_order() {
    let db = Database::open_in_memory().unwrap();
    let names = ["Ibuprofeno", "Paracetamol", "Amoxicilina", "Loratadina", "Omeprazol"];

    let codes: Vec<String> = names
        .iter()
        .map(|name| create(&db, name, 10).code.unwrap())
        .collect();

    assert_eq!(codes, vec!["MED-0001", "MED-0002", "MED-0003", "MED-0004", "MED-0005"]);
    assert_eq!(
        db.get_medicine_by_code("MED-0004").unwrap().unwrap().name,
        "Loratadina"
    );
}

#[test]
fn test_ibuprofeno_stock_scenario() {
    let db = Database::open_in_memory().unwrap();
    let inventory = Inventory::with_today(&db, today());
    let ibuprofeno = create(&db, "Ibuprofeno", 40);

    inventory.record_entry(&admin(), &ibuprofeno.id, 50, None).unwrap();
    inventory.record_exit(&doctor(), &ibuprofeno.id, 10, None).unwrap();
    inventory.record_exit(&doctor(), &ibuprofeno.id, 5, None).unwrap();

    let level = inventory.stock_level(&ibuprofeno.id).unwrap();
    assert_eq!((level.entries, level.exits, level.current), (50, 15, 35));
    assert_eq!(level.status, StockStatus::Low);

    let err = inventory
        .record_exit(&doctor(), &ibuprofeno.id, 40, Some("Dispensación".into()))
        .unwrap_err();
    assert!(matches!(
        err,
        ClinicError::Stock(StockError::InsufficientStock {
            requested: 40,
            available: 35
        })
    ));
    assert_eq!(inventory.movements(&ibuprofeno.id).unwrap().len(), 3);

    inventory.record_exit(&doctor(), &ibuprofeno.id, 35, None).unwrap();
    let level = inventory.stock_level(&ibuprofeno.id).unwrap();
    assert_eq!(level.current, 0);
    assert_eq!(level.status, StockStatus::Depleted);
    assert!(inventory.verify_ledger().unwrap().is_intact());
}

#[test]
fn test_non_positive_quantities_rejected() {
    let db = Database::open_in_memory().unwrap();
    let inventory = Inventory::with_today(&db, today());
    let med = create(&db, "Ibuprofeno", 0);

    for quantity in [0, -5] {
        assert!(matches!(
            inventory.record_entry(&admin(), &med.id, quantity, None),
            Err(ClinicError::Stock(StockError::NonPositiveQuantity(_)))
        ));
    }
    assert!(inventory.movements(&med.id).unwrap().is_empty());
}

#[test]
fn test_tampered_movement_breaks_chain() {
    let db = Database::open_in_memory().unwrap();
    let inventory = Inventory::with_today(&db, today());
    let ibuprofeno = create(&db, "Ibuprofeno", 10);
    let paracetamol = create(&db, "Paracetamol", 10);

    inventory.record_entry(&admin(), &ibuprofeno.id, 50, None).unwrap();
    let exit = inventory.record_exit(&doctor(), &ibuprofeno.id, 10, None).unwrap();
    inventory.record_entry(&admin(), &paracetamol.id, 20, None).unwrap();

    let report = inventory.verify_ledger().unwrap();
    assert_eq!(report.chains_checked, 2);
    assert_eq!(report.rows_checked, 3);
    assert!(report.is_intact());

    // Updates are refused while the append-only trigger is in place.
    assert!(db
        .conn()
        .execute(
            "UPDATE inventory_movements SET quantity = 1 WHERE id = ?",
            [&exit.id],
        )
        .is_err());

    db.conn()
        .execute_batch("DROP TRIGGER inventory_movements_no_update")
        .unwrap();
    db.conn()
        .execute(
            "UPDATE inventory_movements SET quantity = 1 WHERE id = ?",
            [&exit.id],
        )
        .unwrap();

    let report = inventory.verify_ledger().unwrap();
    assert!(!report.is_intact());
    assert_eq!(report.breaks.len(), 1);
    assert_eq!(report.breaks[0].medicine_id, ibuprofeno.id);
    assert_eq!(report.breaks[0].movement_id, exit.id);
}

fn seed_file_db(path: &Path) -> String {
    let db = Database::open(path).unwrap();
    let med = create(&db, "Ibuprofeno", 10);
    Inventory::with_today(&db, today())
        .record_entry(&admin(), &med.id, 50, None)
        .unwrap();
    med.id
}

#[test]
fn test_concurrent_exits_cannot_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");
    let medicine_id = seed_file_db(&path);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let medicine_id = medicine_id.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                Inventory::with_today(&db, today())
                    .record_exit(&doctor(), &medicine_id, 30, None)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
        })
        .collect();

    let results: Vec<Result<(), String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(msg) if msg == "Insufficient stock: requested 30, available 20")));

    let db = Database::open(&path).unwrap();
    let inventory = Inventory::with_today(&db, today());
    assert_eq!(inventory.current_stock(&medicine_id).unwrap(), 20);
    assert!(inventory.verify_ledger().unwrap().is_intact());
}

#[test]
fn test_deleting_medicine_removes_its_ledger() {
    let db = Database::open_in_memory().unwrap();
    let inventory = Inventory::with_today(&db, today());
    let med = create(&db, "Ibuprofeno", 10);
    inventory.record_entry(&admin(), &med.id, 5, None).unwrap();

    inventory.delete_medicine(&admin(), &med.id).unwrap();
    assert_eq!(db.count_rows("inventory_movements").unwrap(), 0);
    assert!(inventory.verify_ledger().unwrap().is_intact());

    // Numbering follows the live catalog size.
    let second = create(&db, "Paracetamol", 10);
    assert_eq!(second.code.as_deref(), Some("MED-0001"));
}

// ============================================================================
// Property tests
// ============================================================================

fn movement(kind: MovementKind, quantity: i64) -> InventoryMovement {
    InventoryMovement::new("m1", kind, quantity, "admin")
}

fn kind_strategy() -> impl Strategy<Value = MovementKind> {
    prop_oneof![Just(MovementKind::Entry), Just(MovementKind::Exit)]
}

proptest! {
    #[test]
    fn prop_stock_ignores_movement_order(
        moves in prop::collection::vec((kind_strategy(), 1i64..500), 0..40),
        seed in any::<u64>(),
    ) {
        let mut movements: Vec<InventoryMovement> =
            moves.iter().map(|(k, q)| movement(*k, *q)).collect();
        let before = current_stock(&movements);

        // Deterministic shuffle driven by the seed.
        let len = movements.len();
        let mut state = seed;
        for i in (1..len).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            movements.swap(i, (state >> 33) as usize % (i + 1));
        }

        prop_assert_eq!(current_stock(&movements), before);
    }

    #[test]
    fn prop_status_thresholds(current in -100i64..1000, minimum in 0i64..500) {
        let status = stock_status(current, minimum);
        let expected = if current <= 0 {
            StockStatus::Depleted
        } else if current <= minimum {
            StockStatus::Low
        } else {
            StockStatus::Normal
        };
        prop_assert_eq!(status, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_ledger_never_goes_negative(
        requests in prop::collection::vec((kind_strategy(), 1i64..60), 1..25),
    ) {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::with_today(&db, today());
        let med = create(&db, "Ibuprofeno", 20);

        let mut expected = 0i64;
        for (kind, quantity) in requests {
            let result = match kind {
                MovementKind::Entry => inventory.record_entry(&admin(), &med.id, quantity, None),
                MovementKind::Exit => inventory.record_exit(&doctor(), &med.id, quantity, None),
            };
            match (kind, result) {
                (MovementKind::Entry, Ok(_)) => expected += quantity,
                (MovementKind::Exit, Ok(_)) => {
                    prop_assert!(quantity <= expected);
                    expected -= quantity;
                }
                (MovementKind::Exit, Err(ClinicError::Stock(StockError::InsufficientStock { available, .. }))) => {
                    prop_assert!(quantity > expected);
                    prop_assert_eq!(available, expected);
                }
                (_, Err(e)) => prop_assert!(false, "unexpected error: {}", e),
            }
            let current = inventory.current_stock(&med.id).unwrap();
            prop_assert_eq!(current, expected);
            prop_assert!(current >= 0);
        }
        prop_assert!(inventory.verify_ledger().unwrap().is_intact());
    }
}
