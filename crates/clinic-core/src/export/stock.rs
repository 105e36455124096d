//! Stock report export.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::Database;
use crate::error::ClinicResult;
use crate::inventory::{Inventory, StockLevel};
use crate::models::StockStatus;

/// Stock levels of every medicine at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReport {
    pub generated_at: String,
    pub as_of: NaiveDate,
    pub medicines: Vec<StockLevel>,
    pub low_count: usize,
    pub depleted_count: usize,
}

impl StockReport {
    /// Build the report from the ledger.
    pub fn build(db: &Database, as_of: NaiveDate) -> ClinicResult<Self> {
        let medicines = Inventory::with_today(db, as_of).stock_overview()?;
        Ok(Self::from_levels(medicines, as_of))
    }

    pub fn from_levels(medicines: Vec<StockLevel>, as_of: NaiveDate) -> Self {
        let count = |status: StockStatus| medicines.iter().filter(|m| m.status == status).count();
        let low_count = count(StockStatus::Low);
        let depleted_count = count(StockStatus::Depleted);
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            as_of,
            medicines,
            low_count,
            depleted_count,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("code,name,entries,exits,current,minimum,status\n");

        for level in &self.medicines {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                escape_csv(level.code.as_deref().unwrap_or("")),
                escape_csv(&level.name),
                level.entries,
                level.exits,
                level.current,
                level.minimum,
                level.status.as_str(),
            ));
        }

        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(code: &str, name: &str, current: i64, minimum: i64, status: StockStatus) -> StockLevel {
        StockLevel {
            medicine_id: format!("id-{}", code),
            code: Some(code.into()),
            name: name.into(),
            entries: current,
            exits: 0,
            current,
            minimum,
            status,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

    #[test]
    fn test_counts() {
        let report = StockReport::from_levels(
            vec![
                level("MED-0001", "Ibuprofeno", 35, 40, StockStatus::Low),
                level("MED-0002", "Paracetamol", 0, 10, StockStatus::Depleted),
                level("MED-0003", "Loratadina", 90, 10, StockStatus::Normal),
            ],
            as_of(),
        );
        assert_eq!(report.low_count, 1);
        assert_eq!(report.depleted_count, 1);
    }

    #[test]
    fn test_csv() {
        let report = StockReport::from_levels(
            vec![level("MED-0001", "Ibuprofeno, 400mg", 35, 40, StockStatus::Low)],
            as_of(),
        );
        let csv = report.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "code,name,entries,exits,current,minimum,status");
        assert_eq!(lines[1], "MED-0001,\"Ibuprofeno, 400mg\",35,0,35,40,bajo");
    }

    #[test]
    fn test_json_uses_status_labels() {
        let report = StockReport::from_levels(
            vec![level("MED-0002", "Paracetamol", 0, 10, StockStatus::Depleted)],
            as_of(),
        );
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"agotado\""));
        assert!(json.contains("\"as_of\": \"2025-01-10\""));
    }
}
