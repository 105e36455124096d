//! Stock derivation and classification.
//!
//! Stock is never stored. It is the sum of entries minus the sum of
//! exits over a medicine's movement ledger, and every status here is
//! computed on read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::MovementTotals;
use crate::models::{InventoryLot, InventoryMovement, LotStatus, MovementKind, StockStatus};

/// Stock rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Quantity must be a positive integer, got {0}")]
    NonPositiveQuantity(i64),
}

/// Current stock from a set of movements. Order does not matter.
pub fn current_stock<'a>(movements: impl IntoIterator<Item = &'a InventoryMovement>) -> i64 {
    movements.into_iter().map(|m| m.signed_quantity()).sum()
}

impl MovementTotals {
    /// Tally totals from in-memory movements.
    pub fn tally<'a>(movements: impl IntoIterator<Item = &'a InventoryMovement>) -> Self {
        movements
            .into_iter()
            .fold(MovementTotals::default(), |mut acc, m| {
                match m.kind {
                    MovementKind::Entry => acc.entries += m.quantity,
                    MovementKind::Exit => acc.exits += m.quantity,
                }
                acc
            })
    }

    pub fn current(&self) -> i64 {
        self.entries - self.exits
    }
}

/// `agotado` at or below zero, `bajo` at or below the minimum, else `normal`.
pub fn stock_status(current: i64, minimum: i64) -> StockStatus {
    if current <= 0 {
        StockStatus::Depleted
    } else if current <= minimum {
        StockStatus::Low
    } else {
        StockStatus::Normal
    }
}

/// Classify a physical lot. Expiry wins over quantity.
pub fn lot_status(lot: &InventoryLot, minimum: i64, today: NaiveDate) -> LotStatus {
    if lot.expiration_date < today {
        LotStatus::Expired
    } else if lot.quantity <= 0 {
        LotStatus::Depleted
    } else if lot.quantity <= minimum {
        LotStatus::LowStock
    } else {
        LotStatus::Available
    }
}

/// Days from `today` until the lot expires; 0 once expired.
pub fn days_until_expiry(lot: &InventoryLot, today: NaiveDate) -> i64 {
    (lot.expiration_date - today).num_days().max(0)
}

/// Check an exit against the available stock.
pub fn check_exit(requested: i64, available: i64) -> Result<(), StockError> {
    if requested <= 0 {
        return Err(StockError::NonPositiveQuantity(requested));
    }
    if requested > available {
        return Err(StockError::InsufficientStock {
            requested,
            available,
        });
    }
    Ok(())
}

/// Ledger-derived stock summary for one medicine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub medicine_id: String,
    pub code: Option<String>,
    pub name: String,
    pub entries: i64,
    pub exits: i64,
    pub current: i64,
    pub minimum: i64,
    pub status: StockStatus,
}

impl StockLevel {
    pub fn needs_restock(&self) -> bool {
        self.status != StockStatus::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(kind: MovementKind, quantity: i64) -> InventoryMovement {
        InventoryMovement::new("med-1", kind, quantity, "admin")
    }

    fn lot(quantity: i64, expires: NaiveDate) -> InventoryLot {
        InventoryLot::new("med-1".into(), quantity, expires)
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_ibuprofeno_stock() {
        let movements = vec![
            movement(MovementKind::Entry, 50),
            movement(MovementKind::Exit, 10),
            movement(MovementKind::Exit, 5),
        ];
        assert_eq!(current_stock(&movements), 35);
        assert_eq!(stock_status(35, 40), StockStatus::Low);

        let totals = MovementTotals::tally(&movements);
        assert_eq!(totals, MovementTotals { entries: 50, exits: 15 });
        assert_eq!(totals.current(), 35);
    }

    #[test]
    fn test_stock_status_boundaries() {
        assert_eq!(stock_status(0, 10), StockStatus::Depleted);
        assert_eq!(stock_status(-3, 10), StockStatus::Depleted);
        assert_eq!(stock_status(10, 10), StockStatus::Low);
        assert_eq!(stock_status(11, 10), StockStatus::Normal);
        // With no minimum, any positive stock is normal
        assert_eq!(stock_status(1, 0), StockStatus::Normal);
    }

    #[test]
    fn test_lot_status_order() {
        let today = date(6, 1);
        assert_eq!(lot_status(&lot(100, date(5, 31)), 10, today), LotStatus::Expired);
        assert_eq!(lot_status(&lot(0, date(5, 31)), 10, today), LotStatus::Expired);
        assert_eq!(lot_status(&lot(0, today), 10, today), LotStatus::Depleted);
        assert_eq!(lot_status(&lot(10, today), 10, today), LotStatus::LowStock);
        assert_eq!(lot_status(&lot(11, date(12, 1)), 10, today), LotStatus::Available);
    }

    #[test]
    fn test_days_until_expiry() {
        let today = date(6, 1);
        assert_eq!(days_until_expiry(&lot(1, date(6, 11)), today), 10);
        assert_eq!(days_until_expiry(&lot(1, date(5, 30)), today), 0);
    }

    #[test]
    fn test_check_exit() {
        assert_eq!(
            check_exit(40, 35),
            Err(StockError::InsufficientStock {
                requested: 40,
                available: 35
            })
        );
        assert!(check_exit(35, 35).is_ok());
        assert_eq!(check_exit(0, 35), Err(StockError::NonPositiveQuantity(0)));
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = StockError::InsufficientStock {
            requested: 40,
            available: 35,
        };
        assert_eq!(err.to_string(), "Insufficient stock: requested 40, available 35");
    }
}
