//! Daily agenda export.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::{format_time, Database};
use crate::error::ClinicResult;
use crate::models::{Appointment, Patient};

/// One line of the agenda.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaEntry {
    pub appointment_id: String,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
    pub patient_name: String,
    pub document_number: String,
    pub appointment_type: String,
    pub status: String,
    pub reason: String,
}

impl AgendaEntry {
    pub fn new(appointment: &Appointment, patient: &Patient) -> Self {
        Self {
            appointment_id: appointment.id.clone(),
            start: format_time(&appointment.start),
            end: format_time(&appointment.end),
            patient_name: patient.full_name(),
            document_number: patient.document_number.clone(),
            appointment_type: appointment.appointment_type.as_str().to_string(),
            status: appointment.status.as_str().to_string(),
            reason: appointment.reason.clone(),
        }
    }
}

/// All appointments of one day, ordered by start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaExport {
    pub date: NaiveDate,
    pub generated_at: String,
    pub entries: Vec<AgendaEntry>,
}

impl AgendaExport {
    pub fn build(db: &Database, date: NaiveDate) -> ClinicResult<Self> {
        let mut entries = Vec::new();
        for appointment in db.list_appointments_on(date)? {
            // Patient deletes cascade, so a missing patient means a concurrent delete
            if let Some(patient) = db.get_patient(&appointment.patient_id)? {
                entries.push(AgendaEntry::new(&appointment, &patient));
            }
        }

        Ok(Self {
            date,
            generated_at: chrono::Utc::now().to_rfc3339(),
            entries,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("date,start,end,patient,document,type,status,reason\n");

        for entry in &self.entries {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                self.date,
                entry.start,
                entry.end,
                escape_csv(&entry.patient_name),
                escape_csv(&entry.document_number),
                entry.appointment_type,
                entry.status,
                escape_csv(&entry.reason),
            ));
        }

        csv
    }
}
