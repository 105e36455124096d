//! Movement ledger database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{InventoryMovement, MovementKind};

/// A stored ledger row: the movement plus its chain hashes.
#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub seq: i64,
    pub movement: InventoryMovement,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
}

/// Entry and exit totals for one medicine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementTotals {
    pub entries: i64,
    pub exits: i64,
}

impl Database {
    /// Append a movement to the ledger.
    pub fn insert_movement(
        &self,
        movement: &InventoryMovement,
        prev_hash: Option<&str>,
        entry_hash: &str,
    ) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO inventory_movements (
                id, medicine_id, kind, quantity, recorded_at, actor, description,
                prev_hash, entry_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                movement.id,
                movement.medicine_id,
                movement.kind.as_str(),
                movement.quantity,
                movement.recorded_at,
                movement.actor,
                movement.description,
                prev_hash,
                entry_hash,
            ],
        )?;
        Ok(())
    }

    /// Hash of the latest ledger row for a medicine.
    pub fn last_entry_hash(&self, medicine_id: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                r#"
                SELECT entry_hash FROM inventory_movements
                WHERE medicine_id = ?
                ORDER BY seq DESC
                LIMIT 1
                "#,
                [medicine_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Sum entries and exits for a medicine.
    pub fn movement_totals(&self, medicine_id: &str) -> DbResult<MovementTotals> {
        self.conn
            .query_row(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN kind = 'entry' THEN quantity END), 0),
                    COALESCE(SUM(CASE WHEN kind = 'exit' THEN quantity END), 0)
                FROM inventory_movements
                WHERE medicine_id = ?
                "#,
                [medicine_id],
                |row| {
                    Ok(MovementTotals {
                        entries: row.get(0)?,
                        exits: row.get(1)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    /// Ledger rows for a medicine, in append order.
    pub fn list_ledger_for_medicine(&self, medicine_id: &str) -> DbResult<Vec<LedgerRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, id, medicine_id, kind, quantity, recorded_at, actor, description,
                   prev_hash, entry_hash
            FROM inventory_movements
            WHERE medicine_id = ?
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map([medicine_id], RawLedgerRow::from_row)?;

        let mut ledger = Vec::new();
        for row in rows {
            ledger.push(row?.try_into()?);
        }
        Ok(ledger)
    }

    /// IDs of medicines that have at least one ledger row.
    pub fn list_ledger_medicine_ids(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT medicine_id FROM inventory_movements ORDER BY medicine_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Movements for a medicine, newest first.
    pub fn list_movements_for_medicine(&self, medicine_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let mut ledger = self.list_ledger_for_medicine(medicine_id)?;
        ledger.reverse();
        Ok(ledger.into_iter().map(|row| row.movement).collect())
    }

    /// All movements, newest first.
    pub fn list_movements(&self, limit: usize) -> DbResult<Vec<InventoryMovement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, id, medicine_id, kind, quantity, recorded_at, actor, description,
                   prev_hash, entry_hash
            FROM inventory_movements
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], RawLedgerRow::from_row)?;

        let mut movements = Vec::new();
        for row in rows {
            let ledger: LedgerRow = row?.try_into()?;
            movements.push(ledger.movement);
        }
        Ok(movements)
    }
}

/// Intermediate row struct for database mapping.
struct RawLedgerRow {
    seq: i64,
    id: String,
    medicine_id: String,
    kind: String,
    quantity: i64,
    recorded_at: String,
    actor: String,
    description: Option<String>,
    prev_hash: Option<String>,
    entry_hash: String,
}

impl RawLedgerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: row.get(1)?,
            medicine_id: row.get(2)?,
            kind: row.get(3)?,
            quantity: row.get(4)?,
            recorded_at: row.get(5)?,
            actor: row.get(6)?,
            description: row.get(7)?,
            prev_hash: row.get(8)?,
            entry_hash: row.get(9)?,
        })
    }
}

impl TryFrom<RawLedgerRow> for LedgerRow {
    type Error = DbError;

    fn try_from(row: RawLedgerRow) -> Result<Self, Self::Error> {
        let kind = MovementKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown movement kind: {}", row.kind)))?;
        Ok(LedgerRow {
            seq: row.seq,
            movement: InventoryMovement {
                id: row.id,
                medicine_id: row.medicine_id,
                kind,
                quantity: row.quantity,
                recorded_at: row.recorded_at,
                actor: row.actor,
                description: row.description,
            },
            prev_hash: row.prev_hash,
            entry_hash: row.entry_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                r#"
                INSERT INTO categories (id, name) VALUES ('c1', 'Analgésicos');
                INSERT INTO suppliers (id, name) VALUES ('s1', 'Farmacorp');
                INSERT INTO medicines (id, name, category_id, supplier_id, code, unit_price_cents)
                VALUES ('m1', 'Ibuprofeno', 'c1', 's1', 'MED-0001', 250);
                "#,
            )
            .unwrap();
        db
    }

    #[test]
    fn test_totals_empty_ledger() {
        let db = setup_db();
        assert_eq!(db.movement_totals("m1").unwrap(), MovementTotals::default());
        assert!(db.last_entry_hash("m1").unwrap().is_none());
    }

    #[test]
    fn test_insert_and_totals() {
        let db = setup_db();

        let entry = InventoryMovement::new("m1", MovementKind::Entry, 50, "admin");
        db.insert_movement(&entry, None, "h1").unwrap();
        let exit = InventoryMovement::new("m1", MovementKind::Exit, 10, "admin");
        db.insert_movement(&exit, Some("h1"), "h2").unwrap();

        let totals = db.movement_totals("m1").unwrap();
        assert_eq!(totals.entries, 50);
        assert_eq!(totals.exits, 10);
        assert_eq!(db.last_entry_hash("m1").unwrap(), Some("h2".into()));

        let ledger = db.list_ledger_for_medicine("m1").unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].movement.id, entry.id);
        assert_eq!(ledger[1].prev_hash, Some("h1".into()));

        let newest_first = db.list_movements_for_medicine("m1").unwrap();
        assert_eq!(newest_first[0].id, exit.id);
        assert_eq!(db.list_movements(1).unwrap().len(), 1);
        assert_eq!(db.list_ledger_medicine_ids().unwrap(), vec!["m1".to_string()]);
    }
}
