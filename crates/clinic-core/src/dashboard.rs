//! Front-page totals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::ClinicResult;
use crate::inventory::Inventory;
use crate::models::{AppointmentStatus, StockStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub patients: i64,
    pub appointments_today: i64,
    pub scheduled_appointments: i64,
    pub medical_histories: i64,
    pub low_stock_medicines: i64,
    pub depleted_medicines: i64,
}

/// Compute the dashboard totals for `today`.
pub fn summarize(db: &Database, today: NaiveDate) -> ClinicResult<DashboardSummary> {
    let mut summary = DashboardSummary {
        patients: db.count_rows("patients")?,
        appointments_today: db.count_appointments_on(today)?,
        scheduled_appointments: db.count_appointments_with_status(AppointmentStatus::Scheduled)?,
        medical_histories: db.count_rows("medical_histories")?,
        ..Default::default()
    };

    for level in Inventory::with_today(db, today).stock_overview()? {
        match level.status {
            StockStatus::Low => summary.low_stock_medicines += 1,
            StockStatus::Depleted => summary.depleted_medicines += 1,
            StockStatus::Normal => {}
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Appointment, AppointmentType, Category, Medicine, Patient, Supplier};
    use chrono::NaiveTime;

    #[test]
    fn test_summary() {
        let db = Database::open_in_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        let patient = Patient::new("Ana".into(), "Pérez".into(), "V-1".into());
        db.insert_patient(&patient).unwrap();
        let appt = Appointment::new(
            patient.id.clone(),
            today,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            AppointmentType::Consultation,
            String::new(),
        );
        db.insert_appointment(&appt).unwrap();

        let category = Category::new("General".into());
        let supplier = Supplier::new("Proveedor".into());
        db.insert_category(&category).unwrap();
        db.insert_supplier(&supplier).unwrap();
        let mut medicine = Medicine::new("Ibuprofeno".into(), category.id, supplier.id, 100);
        medicine.code = Some("MED-0001".into());
        db.insert_medicine(&medicine).unwrap();

        let summary = summarize(&db, today).unwrap();
        assert_eq!(summary.patients, 1);
        assert_eq!(summary.appointments_today, 1);
        assert_eq!(summary.scheduled_appointments, 1);
        assert_eq!(summary.medical_histories, 0);
        assert_eq!(summary.depleted_medicines, 1);
        assert_eq!(summary.low_stock_medicines, 0);
    }
}
