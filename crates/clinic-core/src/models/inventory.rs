//! Medicine inventory models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Medicine category (e.g. "Analgésicos").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    /// Unique category name
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: None,
        }
    }
}

/// Medicine supplier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl Supplier {
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            contact: None,
            phone: None,
            email: None,
            address: None,
        }
    }
}

/// A medicine in the catalog. Stock is never stored here; it is
/// derived from the movement ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub supplier_id: String,
    /// `MED-0001` style code; assigned once and never regenerated
    pub code: Option<String>,
    /// Unit price in cents
    pub unit_price_cents: i64,
    /// Threshold at or below which stock is considered low
    pub minimum_stock: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Medicine {
    /// Create a new medicine without a code.
    pub fn new(name: String, category_id: String, supplier_id: String, unit_price_cents: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: None,
            category_id,
            supplier_id,
            code: None,
            unit_price_cents,
            minimum_stock: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Price formatted with two decimals (e.g. "12.50").
    pub fn unit_price_display(&self) -> String {
        format_cents(self.unit_price_cents)
    }
}

/// Format an amount in cents as `units.cents`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Entry,
    Exit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entry => "entry",
            MovementKind::Exit => "exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(MovementKind::Entry),
            "exit" => Some(MovementKind::Exit),
            _ => None,
        }
    }
}

/// A single append-only stock movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryMovement {
    pub id: String,
    pub medicine_id: String,
    pub kind: MovementKind,
    /// Always positive
    pub quantity: i64,
    pub recorded_at: String,
    /// Username that recorded the movement
    pub actor: String,
    pub description: Option<String>,
}

impl InventoryMovement {
    pub fn new(medicine_id: &str, kind: MovementKind, quantity: i64, actor: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            medicine_id: medicine_id.to_string(),
            kind,
            quantity,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            actor: actor.to_string(),
            description: None,
        }
    }

    /// Signed contribution to the running stock.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            MovementKind::Entry => self.quantity,
            MovementKind::Exit => -self.quantity,
        }
    }

    /// Serialize to canonical JSON for ledger hashing.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A physical batch of a medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryLot {
    pub id: String,
    pub medicine_id: String,
    pub quantity: i64,
    pub expiration_date: NaiveDate,
    /// Manufacturer batch identifier
    pub lot_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl InventoryLot {
    pub fn new(medicine_id: String, quantity: i64, expiration_date: NaiveDate) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            medicine_id,
            quantity,
            expiration_date,
            lot_number: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Aggregate classification of a medicine's ledger-derived stock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StockStatus {
    #[serde(rename = "agotado")]
    Depleted,
    #[serde(rename = "bajo")]
    Low,
    #[serde(rename = "normal")]
    Normal,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Depleted => "agotado",
            StockStatus::Low => "bajo",
            StockStatus::Normal => "normal",
        }
    }
}

/// Classification of a single physical lot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LotStatus {
    #[serde(rename = "caducado")]
    Expired,
    #[serde(rename = "agotado")]
    Depleted,
    #[serde(rename = "bajo_stock")]
    LowStock,
    #[serde(rename = "disponible")]
    Available,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Expired => "caducado",
            LotStatus::Depleted => "agotado",
            LotStatus::LowStock => "bajo_stock",
            LotStatus::Available => "disponible",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1250), "12.50");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-199), "-1.99");
    }

    #[test]
    fn test_signed_quantity() {
        let entry = InventoryMovement::new("m", MovementKind::Entry, 50, "admin");
        let exit = InventoryMovement::new("m", MovementKind::Exit, 10, "admin");
        assert_eq!(entry.signed_quantity(), 50);
        assert_eq!(exit.signed_quantity(), -10);
    }

    #[test]
    fn test_status_serialization_uses_clinic_labels() {
        assert_eq!(serde_json::to_string(&StockStatus::Low).unwrap(), "\"bajo\"");
        assert_eq!(
            serde_json::to_string(&LotStatus::LowStock).unwrap(),
            "\"bajo_stock\""
        );
    }
}
