//! Inventory service: catalog maintenance, ledger movements and lots.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use super::codes::assign_code;
use super::ledger::{hash_entry, verify_ledger, LedgerReport};
use super::stock::{check_exit, days_until_expiry, lot_status, stock_status, StockError, StockLevel};
use crate::access::{authorize, Permission};
use crate::db::{Database, DbError};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{
    Category, InventoryLot, InventoryMovement, LotStatus, Medicine, MovementKind, Supplier,
    UserProfile,
};

/// Attempts at inserting a medicine when its generated code collides.
const MAX_CODE_ATTEMPTS: u32 = 16;

/// Minimum length of category and supplier names.
const MIN_NAME_LEN: usize = 3;

/// Minimum Jaro-Winkler similarity for the fuzzy search fallback.
const FUZZY_THRESHOLD: f64 = 0.85;

/// Fields submitted to create a medicine.
#[derive(Debug, Clone)]
pub struct NewMedicine {
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub supplier_id: String,
    pub unit_price_cents: i64,
    pub minimum_stock: i64,
    /// Explicit code; generated when absent
    pub code: Option<String>,
}

/// Editable medicine fields. The code is not among them.
#[derive(Debug, Clone, Default)]
pub struct MedicineChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub minimum_stock: Option<i64>,
}

/// A lot together with its computed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotView {
    pub lot: InventoryLot,
    pub medicine_name: String,
    pub status: LotStatus,
    pub days_until_expiry: i64,
}

/// Inventory manager over a shared database.
pub struct Inventory<'a> {
    db: &'a Database,
    today: NaiveDate,
}

impl<'a> Inventory<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_today(db, chrono::Local::now().date_naive())
    }

    pub fn with_today(db: &'a Database, today: NaiveDate) -> Self {
        Self { db, today }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub fn create_category(
        &self,
        actor: &UserProfile,
        name: &str,
        description: Option<String>,
    ) -> ClinicResult<Category> {
        authorize(actor, Permission::ManageInventory)?;
        let mut category = Category::new(validate_name(name)?);
        category.description = description;

        self.db.insert_category(&category).map_err(|e| {
            if e.is_unique_violation() {
                ClinicError::InvalidInput(format!("category {} already exists", category.name))
            } else {
                e.into()
            }
        })?;
        tracing::info!(category_id = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub fn update_category(&self, actor: &UserProfile, category: &Category) -> ClinicResult<()> {
        authorize(actor, Permission::ManageInventory)?;
        validate_name(&category.name)?;
        if !self.db.update_category(category)? {
            return Err(ClinicError::NotFound(format!("category {}", category.id)));
        }
        Ok(())
    }

    pub fn list_categories(&self) -> ClinicResult<Vec<Category>> {
        Ok(self.db.list_categories()?)
    }

    /// Delete a category together with its medicines.
    pub fn delete_category(&self, actor: &UserProfile, id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManageInventory)?;
        if !self.db.delete_category(id)? {
            return Err(ClinicError::NotFound(format!("category {}", id)));
        }
        tracing::info!(category_id = id, "category deleted");
        Ok(())
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    pub fn create_supplier(&self, actor: &UserProfile, supplier: Supplier) -> ClinicResult<Supplier> {
        authorize(actor, Permission::ManageInventory)?;
        let supplier = validate_supplier(supplier)?;
        self.db.insert_supplier(&supplier)?;
        tracing::info!(supplier_id = %supplier.id, name = %supplier.name, "supplier created");
        Ok(supplier)
    }

    pub fn update_supplier(&self, actor: &UserProfile, supplier: Supplier) -> ClinicResult<Supplier> {
        authorize(actor, Permission::ManageInventory)?;
        let supplier = validate_supplier(supplier)?;
        if !self.db.update_supplier(&supplier)? {
            return Err(ClinicError::NotFound(format!("supplier {}", supplier.id)));
        }
        Ok(supplier)
    }

    pub fn get_supplier(&self, id: &str) -> ClinicResult<Supplier> {
        self.db
            .get_supplier(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("supplier {}", id)))
    }

    pub fn list_suppliers(&self) -> ClinicResult<Vec<Supplier>> {
        Ok(self.db.list_suppliers()?)
    }

    /// Delete a supplier together with its medicines.
    pub fn delete_supplier(&self, actor: &UserProfile, id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManageInventory)?;
        if !self.db.delete_supplier(id)? {
            return Err(ClinicError::NotFound(format!("supplier {}", id)));
        }
        tracing::info!(supplier_id = id, "supplier deleted");
        Ok(())
    }

    // =========================================================================
    // Medicines
    // =========================================================================

    /// Create a medicine, generating a `MED-NNNN` code when none is given.
    pub fn create_medicine(&self, actor: &UserProfile, new: NewMedicine) -> ClinicResult<Medicine> {
        authorize(actor, Permission::ManageInventory)?;

        let name = new.name.trim();
        if name.is_empty() {
            return Err(ClinicError::InvalidInput("medicine name is empty".into()));
        }
        validate_price(new.unit_price_cents)?;
        validate_minimum(new.minimum_stock)?;

        let mut medicine = Medicine::new(
            name.to_string(),
            new.category_id,
            new.supplier_id,
            new.unit_price_cents,
        );
        medicine.description = new.description;
        medicine.minimum_stock = new.minimum_stock;

        let tx = self.db.begin_immediate()?;
        self.require_references(&medicine.category_id, &medicine.supplier_id)?;

        match new.code {
            Some(code) => {
                let code = code.trim().to_string();
                if code.is_empty() {
                    return Err(ClinicError::InvalidInput("medicine code is empty".into()));
                }
                if self.db.medicine_code_exists(&code)? {
                    return Err(ClinicError::InvalidInput(format!(
                        "medicine code {} is already in use",
                        code
                    )));
                }
                medicine.code = Some(code);
                self.db.insert_medicine(&medicine)?;
            }
            None => self.insert_with_generated_code(&mut medicine)?,
        }

        tx.commit()?;
        tracing::info!(
            medicine_id = %medicine.id,
            code = medicine.code.as_deref().unwrap_or(""),
            "medicine created"
        );
        Ok(medicine)
    }

    /// Look up a free code and insert, retrying when the insert still
    /// loses a uniqueness race.
    fn insert_with_generated_code(&self, medicine: &mut Medicine) -> ClinicResult<()> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let count = self.db.count_medicines()?;
            let code = assign_code(count, |c| self.db.medicine_code_exists(c))?;
            medicine.code = Some(code);

            match self.db.insert_medicine(medicine) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!(attempt, code = ?medicine.code, "medicine code collided, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DbError::Constraint("could not allocate a unique medicine code".into()).into())
    }

    /// Update editable fields. Codes are immutable once assigned.
    pub fn update_medicine(
        &self,
        actor: &UserProfile,
        id: &str,
        changes: MedicineChanges,
    ) -> ClinicResult<Medicine> {
        authorize(actor, Permission::ManageInventory)?;

        let tx = self.db.begin_immediate()?;
        let mut medicine = self.get_medicine(id)?;

        if let Some(name) = changes.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ClinicError::InvalidInput("medicine name is empty".into()));
            }
            medicine.name = name.to_string();
        }
        if let Some(description) = changes.description {
            medicine.description = description;
        }
        if let Some(category_id) = changes.category_id {
            medicine.category_id = category_id;
        }
        if let Some(supplier_id) = changes.supplier_id {
            medicine.supplier_id = supplier_id;
        }
        if let Some(price) = changes.unit_price_cents {
            validate_price(price)?;
            medicine.unit_price_cents = price;
        }
        if let Some(minimum) = changes.minimum_stock {
            validate_minimum(minimum)?;
            medicine.minimum_stock = minimum;
        }
        self.require_references(&medicine.category_id, &medicine.supplier_id)?;

        self.db.update_medicine(&medicine)?;
        tx.commit()?;
        tracing::info!(medicine_id = id, "medicine updated");
        self.get_medicine(id)
    }

    pub fn get_medicine(&self, id: &str) -> ClinicResult<Medicine> {
        self.db
            .get_medicine(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("medicine {}", id)))
    }

    pub fn get_medicine_by_code(&self, code: &str) -> ClinicResult<Medicine> {
        self.db
            .get_medicine_by_code(code)?
            .ok_or_else(|| ClinicError::NotFound(format!("medicine {}", code)))
    }

    pub fn list_medicines(&self) -> ClinicResult<Vec<Medicine>> {
        Ok(self.db.list_medicines()?)
    }

    /// Full-text search over name, description and code.
    ///
    /// Falls back to fuzzy name matching when full-text search finds
    /// nothing, so small misspellings ("ibuprofeon") still match.
    pub fn search_medicines(&self, query: &str, limit: usize) -> ClinicResult<Vec<Medicine>> {
        let hits = self.db.search_medicines(query, limit)?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f64, Medicine)> = self
            .db
            .list_medicines()?
            .into_iter()
            .map(|m| (jaro_winkler(&needle, &m.name.to_lowercase()), m))
            .filter(|(score, _)| *score >= FUZZY_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    /// Delete a medicine together with its lots and ledger.
    pub fn delete_medicine(&self, actor: &UserProfile, id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManageInventory)?;
        if !self.db.delete_medicine(id)? {
            return Err(ClinicError::NotFound(format!("medicine {}", id)));
        }
        tracing::info!(medicine_id = id, "medicine deleted");
        Ok(())
    }

    /// Assign codes to medicines created without one, oldest first.
    pub fn backfill_missing_codes(&self, actor: &UserProfile) -> ClinicResult<Vec<Medicine>> {
        authorize(actor, Permission::ManageInventory)?;

        let tx = self.db.begin_immediate()?;
        let pending = self.db.list_medicines_without_code()?;
        let mut coded = self
            .db
            .count_medicines()?
            .saturating_sub(pending.len() as u64);
        let mut updated = Vec::with_capacity(pending.len());

        for mut medicine in pending {
            let code = assign_code(coded, |c| self.db.medicine_code_exists(c))?;
            self.db.set_medicine_code(&medicine.id, &code)?;
            medicine.code = Some(code);
            coded += 1;
            updated.push(medicine);
        }

        tx.commit()?;
        tracing::info!(count = updated.len(), "medicine codes backfilled");
        Ok(updated)
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Append a stock entry.
    pub fn record_entry(
        &self,
        actor: &UserProfile,
        medicine_id: &str,
        quantity: i64,
        description: Option<String>,
    ) -> ClinicResult<InventoryMovement> {
        authorize(actor, Permission::ManageInventory)?;
        self.record_movement(actor, medicine_id, MovementKind::Entry, quantity, description)
    }

    /// Append a stock exit. Fails without recording anything when the
    /// quantity exceeds the current stock.
    pub fn record_exit(
        &self,
        actor: &UserProfile,
        medicine_id: &str,
        quantity: i64,
        description: Option<String>,
    ) -> ClinicResult<InventoryMovement> {
        authorize(actor, Permission::DispenseMedicine)?;
        self.record_movement(actor, medicine_id, MovementKind::Exit, quantity, description)
    }

    fn record_movement(
        &self,
        actor: &UserProfile,
        medicine_id: &str,
        kind: MovementKind,
        quantity: i64,
        description: Option<String>,
    ) -> ClinicResult<InventoryMovement> {
        if quantity <= 0 {
            return Err(StockError::NonPositiveQuantity(quantity).into());
        }

        let tx = self.db.begin_immediate()?;
        self.get_medicine(medicine_id)?;

        let totals = self.db.movement_totals(medicine_id)?;
        match kind {
            MovementKind::Exit => {
                let available = totals.current();
                if let Err(e) = check_exit(quantity, available) {
                    tracing::warn!(medicine_id, quantity, available, "exit rejected");
                    return Err(e.into());
                }
            }
            // The ledger is append-only: a total SQLite cannot sum would
            // make the medicine's stock unreadable for good.
            MovementKind::Entry => {
                if totals.entries.checked_add(quantity).is_none() {
                    tracing::warn!(medicine_id, quantity, "entry rejected, total out of range");
                    return Err(ClinicError::InvalidInput(format!(
                        "an entry of {} would push the recorded total past the supported maximum",
                        quantity
                    )));
                }
            }
        }

        let mut movement = InventoryMovement::new(medicine_id, kind, quantity, &actor.username);
        movement.description = description;

        let prev_hash = self.db.last_entry_hash(medicine_id)?;
        let json = movement.to_canonical_json().map_err(DbError::from)?;
        let entry_hash = hash_entry(prev_hash.as_deref(), &json);
        self.db
            .insert_movement(&movement, prev_hash.as_deref(), &entry_hash)?;

        tx.commit()?;
        tracing::info!(
            medicine_id,
            kind = kind.as_str(),
            quantity,
            username = %actor.username,
            "movement recorded"
        );
        Ok(movement)
    }

    /// Movements for a medicine, newest first.
    pub fn movements(&self, medicine_id: &str) -> ClinicResult<Vec<InventoryMovement>> {
        Ok(self.db.list_movements_for_medicine(medicine_id)?)
    }

    pub fn recent_movements(&self, limit: usize) -> ClinicResult<Vec<InventoryMovement>> {
        Ok(self.db.list_movements(limit)?)
    }

    /// Recompute the hash chains of the movement ledger.
    pub fn verify_ledger(&self) -> ClinicResult<LedgerReport> {
        Ok(verify_ledger(self.db)?)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    pub fn current_stock(&self, medicine_id: &str) -> ClinicResult<i64> {
        self.get_medicine(medicine_id)?;
        Ok(self.db.movement_totals(medicine_id)?.current())
    }

    pub fn stock_level(&self, medicine_id: &str) -> ClinicResult<StockLevel> {
        let medicine = self.get_medicine(medicine_id)?;
        self.level_for(medicine)
    }

    /// Stock levels of every medicine, ordered by name.
    pub fn stock_overview(&self) -> ClinicResult<Vec<StockLevel>> {
        self.db
            .list_medicines()?
            .into_iter()
            .map(|m| self.level_for(m))
            .collect()
    }

    fn level_for(&self, medicine: Medicine) -> ClinicResult<StockLevel> {
        let totals = self.db.movement_totals(&medicine.id)?;
        let current = totals.current();
        Ok(StockLevel {
            status: stock_status(current, medicine.minimum_stock),
            medicine_id: medicine.id,
            code: medicine.code,
            name: medicine.name,
            entries: totals.entries,
            exits: totals.exits,
            current,
            minimum: medicine.minimum_stock,
        })
    }

    // =========================================================================
    // Lots
    // =========================================================================

    /// Register a physical lot. Lots do not touch the movement ledger.
    pub fn add_lot(
        &self,
        actor: &UserProfile,
        medicine_id: &str,
        quantity: i64,
        expiration_date: NaiveDate,
        lot_number: Option<String>,
    ) -> ClinicResult<InventoryLot> {
        authorize(actor, Permission::ManageInventory)?;

        if quantity <= 0 {
            return Err(ClinicError::InvalidInput(
                "lot quantity must be greater than zero".into(),
            ));
        }
        if expiration_date < self.today {
            return Err(ClinicError::InvalidInput(format!(
                "expiration date {} is before today ({})",
                expiration_date, self.today
            )));
        }
        self.get_medicine(medicine_id)?;

        let mut lot = InventoryLot::new(medicine_id.to_string(), quantity, expiration_date);
        lot.lot_number = lot_number;
        self.db.insert_lot(&lot)?;
        tracing::info!(lot_id = %lot.id, medicine_id, quantity, "lot added");
        Ok(lot)
    }

    /// Update a lot. Quantity may drop to zero as the batch is used up.
    pub fn update_lot(&self, actor: &UserProfile, lot: &InventoryLot) -> ClinicResult<()> {
        authorize(actor, Permission::ManageInventory)?;
        if lot.quantity < 0 {
            return Err(ClinicError::InvalidInput("lot quantity cannot be negative".into()));
        }
        self.get_medicine(&lot.medicine_id)?;
        if !self.db.update_lot(lot)? {
            return Err(ClinicError::NotFound(format!("lot {}", lot.id)));
        }
        Ok(())
    }

    pub fn delete_lot(&self, actor: &UserProfile, id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManageInventory)?;
        if !self.db.delete_lot(id)? {
            return Err(ClinicError::NotFound(format!("lot {}", id)));
        }
        Ok(())
    }

    /// Lots with their status, soonest expiry first.
    pub fn list_lots(&self, medicine_id: Option<&str>) -> ClinicResult<Vec<LotView>> {
        let lots = self.db.list_lots(medicine_id)?;
        self.views(lots)
    }

    /// Lots expiring within `days` days, expired ones included.
    pub fn lots_expiring_within(&self, days: u32) -> ClinicResult<Vec<LotView>> {
        // Stored dates are four-digit years; past that every lot qualifies.
        let horizon = self
            .today
            .checked_add_days(chrono::Days::new(u64::from(days)))
            .filter(|horizon| horizon.year() <= 9999);
        let lots = match horizon {
            Some(horizon) => self.db.list_lots_expiring_by(horizon)?,
            None => self.db.list_lots(None)?,
        };
        self.views(lots)
    }

    fn views(&self, lots: Vec<InventoryLot>) -> ClinicResult<Vec<LotView>> {
        let mut views = Vec::with_capacity(lots.len());
        for lot in lots {
            let medicine = self.get_medicine(&lot.medicine_id)?;
            views.push(LotView {
                status: lot_status(&lot, medicine.minimum_stock, self.today),
                days_until_expiry: days_until_expiry(&lot, self.today),
                medicine_name: medicine.name,
                lot,
            });
        }
        Ok(views)
    }

    fn require_references(&self, category_id: &str, supplier_id: &str) -> ClinicResult<()> {
        if self.db.get_category(category_id)?.is_none() {
            return Err(ClinicError::NotFound(format!("category {}", category_id)));
        }
        if self.db.get_supplier(supplier_id)?.is_none() {
            return Err(ClinicError::NotFound(format!("supplier {}", supplier_id)));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> ClinicResult<String> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ClinicError::InvalidInput(format!(
            "name must be at least {} characters long",
            MIN_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_price(cents: i64) -> ClinicResult<()> {
    if cents <= 0 {
        return Err(ClinicError::InvalidInput(
            "unit price must be greater than zero".into(),
        ));
    }
    Ok(())
}

fn validate_minimum(minimum: i64) -> ClinicResult<()> {
    if minimum < 0 {
        return Err(ClinicError::InvalidInput(
            "minimum stock cannot be negative".into(),
        ));
    }
    Ok(())
}

fn validate_supplier(mut supplier: Supplier) -> ClinicResult<Supplier> {
    supplier.name = validate_name(&supplier.name)?;
    if let Some(phone) = supplier.phone.as_deref().map(str::trim) {
        if !phone.is_empty() && !is_valid_phone(phone) {
            return Err(ClinicError::InvalidInput(
                "phone number must have between 9 and 15 digits".into(),
            ));
        }
    }
    if let Some(email) = supplier.email.as_deref().map(str::trim) {
        if !email.is_empty() && !is_plausible_email(email) {
            return Err(ClinicError::InvalidInput(format!("invalid email address {}", email)));
        }
    }
    Ok(supplier)
}

/// An optional `+`, an optional leading `1`, then 9 to 15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match digits.len() {
        9..=15 => true,
        16 => digits.starts_with('1'),
        _ => false,
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
