//! Categories, suppliers, medicines and lots database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_date, parse_date, Database, DbError, DbResult};
use crate::models::{Category, InventoryLot, Medicine, Supplier};

const MEDICINE_COLUMNS: &str = r#"
    m.id, m.name, m.description, m.category_id, m.supplier_id, m.code,
    m.unit_price_cents, m.minimum_stock, m.created_at, m.updated_at
"#;

impl Database {
    // =========================================================================
    // Categories
    // =========================================================================

    pub fn insert_category(&self, category: &Category) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO categories (id, name, description) VALUES (?1, ?2, ?3)",
            params![category.id, category.name, category.description],
        )?;
        Ok(())
    }

    pub fn update_category(&self, category: &Category) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE categories SET name = ?2, description = ?3, updated_at = datetime('now') WHERE id = ?1",
            params![category.id, category.name, category.description],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        self.conn
            .query_row(
                "SELECT id, name, description FROM categories WHERE id = ?",
                [id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_categories(&self) -> DbResult<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a category. Its medicines cascade.
    pub fn delete_category(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    pub fn insert_supplier(&self, supplier: &Supplier) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO suppliers (id, name, contact, phone, email, address)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                supplier.id,
                supplier.name,
                supplier.contact,
                supplier.phone,
                supplier.email,
                supplier.address,
            ],
        )?;
        Ok(())
    }

    pub fn update_supplier(&self, supplier: &Supplier) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE suppliers SET
                name = ?2, contact = ?3, phone = ?4, email = ?5, address = ?6,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                supplier.id,
                supplier.name,
                supplier.contact,
                supplier.phone,
                supplier.email,
                supplier.address,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        self.conn
            .query_row(
                "SELECT id, name, contact, phone, email, address FROM suppliers WHERE id = ?",
                [id],
                supplier_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_suppliers(&self) -> DbResult<Vec<Supplier>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, contact, phone, email, address FROM suppliers ORDER BY name",
        )?;
        let rows = stmt.query_map([], supplier_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a supplier. Its medicines cascade.
    pub fn delete_supplier(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM suppliers WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Medicines
    // =========================================================================

    /// Insert a medicine. The code column is written as given.
    pub fn insert_medicine(&self, medicine: &Medicine) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medicines (
                id, name, description, category_id, supplier_id, code,
                unit_price_cents, minimum_stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                medicine.id,
                medicine.name,
                medicine.description,
                medicine.category_id,
                medicine.supplier_id,
                medicine.code,
                medicine.unit_price_cents,
                medicine.minimum_stock,
                medicine.created_at,
                medicine.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update editable medicine fields. The code is never touched here.
    pub fn update_medicine(&self, medicine: &Medicine) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE medicines SET
                name = ?2,
                description = ?3,
                category_id = ?4,
                supplier_id = ?5,
                unit_price_cents = ?6,
                minimum_stock = ?7,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                medicine.id,
                medicine.name,
                medicine.description,
                medicine.category_id,
                medicine.supplier_id,
                medicine.unit_price_cents,
                medicine.minimum_stock,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Set the code of a medicine that has none.
    pub fn set_medicine_code(&self, id: &str, code: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medicines SET code = ?2, updated_at = datetime('now') WHERE id = ?1 AND code IS NULL",
            params![id, code],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        let sql = format!("SELECT {} FROM medicines m WHERE m.id = ?", MEDICINE_COLUMNS);
        self.conn
            .query_row(&sql, [id], medicine_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn get_medicine_by_code(&self, code: &str) -> DbResult<Option<Medicine>> {
        let sql = format!("SELECT {} FROM medicines m WHERE m.code = ?", MEDICINE_COLUMNS);
        self.conn
            .query_row(&sql, [code], medicine_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn medicine_code_exists(&self, code: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM medicines WHERE code = ?",
            [code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_medicines(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM medicines", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// All medicines ordered by name.
    pub fn list_medicines(&self) -> DbResult<Vec<Medicine>> {
        let sql = format!("SELECT {} FROM medicines m ORDER BY m.name", MEDICINE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], medicine_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Medicines still waiting for a code, in insertion order.
    pub fn list_medicines_without_code(&self) -> DbResult<Vec<Medicine>> {
        let sql = format!(
            "SELECT {} FROM medicines m WHERE m.code IS NULL ORDER BY m.rowid",
            MEDICINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], medicine_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Search medicines using FTS5 (BM25 ranking).
    pub fn search_medicines(&self, query: &str, limit: usize) -> DbResult<Vec<Medicine>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {}, bm25(medicines_fts) as rank
            FROM medicines m
            JOIN medicines_fts fts ON m.rowid = fts.rowid
            WHERE medicines_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
            MEDICINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![escaped_query, limit as i64], medicine_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a medicine. Lots and ledger rows cascade.
    pub fn delete_medicine(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM medicines WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Lots
    // =========================================================================

    pub fn insert_lot(&self, lot: &InventoryLot) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO inventory_lots (
                id, medicine_id, quantity, expiration_date, lot_number, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                lot.id,
                lot.medicine_id,
                lot.quantity,
                format_date(&lot.expiration_date),
                lot.lot_number,
                lot.created_at,
                lot.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_lot(&self, lot: &InventoryLot) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE inventory_lots SET
                medicine_id = ?2,
                quantity = ?3,
                expiration_date = ?4,
                lot_number = ?5,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                lot.id,
                lot.medicine_id,
                lot.quantity,
                format_date(&lot.expiration_date),
                lot.lot_number,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_lot(&self, id: &str) -> DbResult<Option<InventoryLot>> {
        self.conn
            .query_row(
                r#"
                SELECT id, medicine_id, quantity, expiration_date, lot_number, created_at, updated_at
                FROM inventory_lots WHERE id = ?
                "#,
                [id],
                LotRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Lots ordered by expiration date, optionally for one medicine.
    pub fn list_lots(&self, medicine_id: Option<&str>) -> DbResult<Vec<InventoryLot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, medicine_id, quantity, expiration_date, lot_number, created_at, updated_at
            FROM inventory_lots
            WHERE ?1 IS NULL OR medicine_id = ?1
            ORDER BY expiration_date, rowid
            "#,
        )?;
        let rows = stmt.query_map([medicine_id], LotRow::from_row)?;

        let mut lots = Vec::new();
        for row in rows {
            lots.push(row?.try_into()?);
        }
        Ok(lots)
    }

    /// Lots whose expiration date is on or before `date`.
    pub fn list_lots_expiring_by(&self, date: NaiveDate) -> DbResult<Vec<InventoryLot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, medicine_id, quantity, expiration_date, lot_number, created_at, updated_at
            FROM inventory_lots
            WHERE expiration_date <= ?
            ORDER BY expiration_date, rowid
            "#,
        )?;
        let rows = stmt.query_map([format_date(&date)], LotRow::from_row)?;

        let mut lots = Vec::new();
        for row in rows {
            lots.push(row?.try_into()?);
        }
        Ok(lots)
    }

    pub fn delete_lot(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM inventory_lots WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn supplier_from_row(row: &Row<'_>) -> rusqlite::Result<Supplier> {
    Ok(Supplier {
        id: row.get(0)?,
        name: row.get(1)?,
        contact: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
    })
}

fn medicine_from_row(row: &Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
        supplier_id: row.get(4)?,
        code: row.get(5)?,
        unit_price_cents: row.get(6)?,
        minimum_stock: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Intermediate row struct for database mapping.
struct LotRow {
    id: String,
    medicine_id: String,
    quantity: i64,
    expiration_date: String,
    lot_number: Option<String>,
    created_at: String,
    updated_at: String,
}

impl LotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            medicine_id: row.get(1)?,
            quantity: row.get(2)?,
            expiration_date: row.get(3)?,
            lot_number: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<LotRow> for InventoryLot {
    type Error = DbError;

    fn try_from(row: LotRow) -> Result<Self, Self::Error> {
        Ok(InventoryLot {
            id: row.id,
            medicine_id: row.medicine_id,
            quantity: row.quantity,
            expiration_date: parse_date(&row.expiration_date)?,
            lot_number: row.lot_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> (Database, Category, Supplier) {
        let db = Database::open_in_memory().unwrap();
        let category = Category::new("Analgésicos".into());
        let supplier = Supplier::new("Farmacorp".into());
        db.insert_category(&category).unwrap();
        db.insert_supplier(&supplier).unwrap();
        (db, category, supplier)
    }

    fn make_medicine(name: &str, code: Option<&str>, c: &Category, s: &Supplier) -> Medicine {
        let mut medicine = Medicine::new(name.into(), c.id.clone(), s.id.clone(), 250);
        medicine.code = code.map(String::from);
        medicine
    }

    #[test]
    fn test_insert_and_get_medicine() {
        let (db, c, s) = setup_db();
        let mut medicine = make_medicine("Ibuprofeno 400mg", Some("MED-0001"), &c, &s);
        medicine.minimum_stock = 40;
        db.insert_medicine(&medicine).unwrap();

        let retrieved = db.get_medicine(&medicine.id).unwrap().unwrap();
        assert_eq!(retrieved, medicine);
        assert!(db.medicine_code_exists("MED-0001").unwrap());
        assert_eq!(db.count_medicines().unwrap(), 1);
        assert_eq!(
            db.get_medicine_by_code("MED-0001").unwrap().unwrap().id,
            medicine.id
        );
    }

    #[test]
    fn test_update_medicine_keeps_code() {
        let (db, c, s) = setup_db();
        let mut medicine = make_medicine("Ibuprofeno", Some("MED-0001"), &c, &s);
        db.insert_medicine(&medicine).unwrap();

        medicine.name = "Ibuprofeno 600mg".into();
        medicine.code = Some("MED-9999".into());
        db.update_medicine(&medicine).unwrap();

        let retrieved = db.get_medicine(&medicine.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Ibuprofeno 600mg");
        assert_eq!(retrieved.code, Some("MED-0001".into()));
    }

    #[test]
    fn test_set_code_only_when_missing() {
        let (db, c, s) = setup_db();
        let medicine = make_medicine("Paracetamol", None, &c, &s);
        db.insert_medicine(&medicine).unwrap();

        assert_eq!(db.list_medicines_without_code().unwrap().len(), 1);
        assert!(db.set_medicine_code(&medicine.id, "MED-0001").unwrap());
        assert!(!db.set_medicine_code(&medicine.id, "MED-0002").unwrap());
        assert!(db.list_medicines_without_code().unwrap().is_empty());
    }

    #[test]
    fn test_search_medicines() {
        let (db, c, s) = setup_db();
        let mut ibuprofen = make_medicine("Ibuprofeno 400mg", Some("MED-0001"), &c, &s);
        ibuprofen.description = Some("Antiinflamatorio".into());
        db.insert_medicine(&ibuprofen).unwrap();
        db.insert_medicine(&make_medicine("Amoxicilina 500mg", Some("MED-0002"), &c, &s))
            .unwrap();

        let results = db.search_medicines("ibupro", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ibuprofen.id);

        let results = db.search_medicines("antiinflamatorio", 10).unwrap();
        assert_eq!(results.len(), 1);

        let results = db.search_medicines("MED-0002", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Amoxicilina 500mg");

        assert!(db.search_medicines("***", 10).unwrap().is_empty());
    }

    #[test]
    fn test_category_delete_cascades() {
        let (db, c, s) = setup_db();
        let medicine = make_medicine("Ibuprofeno", Some("MED-0001"), &c, &s);
        db.insert_medicine(&medicine).unwrap();

        assert!(db.delete_category(&c.id).unwrap());
        assert!(db.get_medicine(&medicine.id).unwrap().is_none());
    }

    #[test]
    fn test_lots() {
        let (db, c, s) = setup_db();
        let medicine = make_medicine("Ibuprofeno", Some("MED-0001"), &c, &s);
        db.insert_medicine(&medicine).unwrap();

        let early = InventoryLot::new(
            medicine.id.clone(),
            20,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        );
        let mut late = InventoryLot::new(
            medicine.id.clone(),
            30,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        );
        late.lot_number = Some("L-778".into());
        db.insert_lot(&late).unwrap();
        db.insert_lot(&early).unwrap();

        let lots = db.list_lots(Some(&medicine.id)).unwrap();
        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].id, early.id);
        assert_eq!(db.list_lots(None).unwrap().len(), 2);

        let expiring = db
            .list_lots_expiring_by(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap())
            .unwrap();
        assert_eq!(expiring.len(), 1);

        late.quantity = 5;
        assert!(db.update_lot(&late).unwrap());
        assert_eq!(db.get_lot(&late.id).unwrap().unwrap().quantity, 5);

        assert!(db.delete_lot(&early.id).unwrap());
        assert_eq!(db.list_lots(None).unwrap().len(), 1);
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("MED-0001"), "MED* 0001*");
        assert_eq!(escape_fts_query("  ibu  "), "ibu*");
        assert_eq!(escape_fts_query("\"*"), "");
    }
}
