//! Appointment models.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Appointment lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked, not yet attended
    Scheduled,
    /// Attended and closed
    Completed,
    /// Cancelled by patient or clinic
    Cancelled,
    /// Patient did not show up
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no_show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }
}

/// Kind of visit. Each kind has an estimated duration used to
/// propose an end time when none is given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    Emergency,
    CheckUp,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::FollowUp => "follow_up",
            AppointmentType::Emergency => "emergency",
            AppointmentType::CheckUp => "check_up",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "consultation" => Some(AppointmentType::Consultation),
            "follow_up" => Some(AppointmentType::FollowUp),
            "emergency" => Some(AppointmentType::Emergency),
            "check_up" => Some(AppointmentType::CheckUp),
            _ => None,
        }
    }

    /// Estimated duration in minutes.
    pub fn estimated_minutes(&self) -> i64 {
        match self {
            AppointmentType::Consultation => 30,
            AppointmentType::FollowUp => 20,
            AppointmentType::Emergency => 60,
            AppointmentType::CheckUp => 15,
        }
    }

    /// Default end time for a visit starting at `start`.
    ///
    /// Returns `None` when the visit would run past midnight.
    pub fn default_end(&self, start: NaiveTime) -> Option<NaiveTime> {
        let (end, wrapped) =
            start.overflowing_add_signed(Duration::minutes(self.estimated_minutes()));
        (wrapped == 0).then_some(end)
    }
}

/// A booked appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    /// Inclusive start of the `[start, end)` interval
    pub start: NaiveTime,
    /// Exclusive end of the `[start, end)` interval
    pub end: NaiveTime,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    /// Reason for the visit
    pub reason: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    /// Create a new scheduled appointment.
    pub fn new(
        patient_id: String,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        appointment_type: AppointmentType,
        reason: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            date,
            start,
            end,
            status: AppointmentStatus::Scheduled,
            appointment_type,
            reason,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// What an appointment note records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Created,
    Edited,
    StatusChanged,
    /// Free-text note added by staff
    Manual,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Created => "created",
            NoteKind::Edited => "edited",
            NoteKind::StatusChanged => "status_changed",
            NoteKind::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(NoteKind::Created),
            "edited" => Some(NoteKind::Edited),
            "status_changed" => Some(NoteKind::StatusChanged),
            "manual" => Some(NoteKind::Manual),
            _ => None,
        }
    }
}

/// Audit/staff note attached to an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentNote {
    pub id: String,
    pub appointment_id: String,
    pub kind: NoteKind,
    pub body: String,
    /// Username of the staff member
    pub author: String,
    pub created_at: String,
}

impl AppointmentNote {
    pub fn new(appointment_id: &str, kind: NoteKind, body: String, author: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment_id.to_string(),
            kind,
            body,
            author: author.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
