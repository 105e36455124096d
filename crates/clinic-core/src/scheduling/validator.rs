//! Appointment conflict validation.
//!
//! Pure decision logic: given a candidate interval and the patient's
//! existing appointments, decide whether the candidate may be persisted.
//! Intervals are half-open, `[start, end)`, so back-to-back visits
//! (09:00–09:30 then 09:30–10:00) do not conflict.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::models::Appointment;

/// Reasons a candidate appointment is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error(
        "End time {} must be after start time {}",
        .end.format("%H:%M"),
        .start.format("%H:%M")
    )]
    InvalidInterval { start: NaiveTime, end: NaiveTime },

    #[error("Cannot book an appointment on {date}, which is before today ({today})")]
    PastDate { date: NaiveDate, today: NaiveDate },

    #[error(
        "The patient already has an appointment on {date} from {} to {}",
        .start.format("%H:%M"),
        .end.format("%H:%M")
    )]
    Conflict {
        appointment_id: String,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },
}

/// Whether the candidate is a new booking or an edit of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent<'a> {
    Create,
    Edit { appointment_id: &'a str },
}

impl Intent<'_> {
    pub fn is_new(&self) -> bool {
        matches!(self, Intent::Create)
    }
}

/// The scheduling-relevant fields of an appointment being saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub patient_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Candidate {
    pub fn new(patient_id: impl Into<String>, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            patient_id: patient_id.into(),
            date,
            start,
            end,
        }
    }

    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self::new(
            appointment.patient_id.clone(),
            appointment.date,
            appointment.start,
            appointment.end,
        )
    }

    /// Whether `[start, end)` intersects the appointment's interval on the same date.
    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.date == other.date && intervals_overlap(self.start, self.end, other.start, other.end)
    }
}

/// `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`.
pub fn intervals_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

/// Validate a candidate against the patient's existing appointments.
///
/// Checks run in order: interval shape, past date (new bookings only),
/// then overlap. Records of other patients or other dates in `existing`
/// are ignored; when editing, the edited appointment's own record is
/// excluded by id.
pub fn validate(
    candidate: &Candidate,
    existing: &[Appointment],
    intent: Intent<'_>,
    today: NaiveDate,
) -> Result<(), ScheduleError> {
    if candidate.end <= candidate.start {
        return Err(ScheduleError::InvalidInterval {
            start: candidate.start,
            end: candidate.end,
        });
    }

    if intent.is_new() && candidate.date < today {
        return Err(ScheduleError::PastDate {
            date: candidate.date,
            today,
        });
    }

    let own_id = match intent {
        Intent::Edit { appointment_id } => Some(appointment_id),
        Intent::Create => None,
    };

    let conflict = existing
        .iter()
        .filter(|appt| appt.patient_id == candidate.patient_id)
        .filter(|appt| Some(appt.id.as_str()) != own_id)
        .find(|appt| candidate.overlaps(appt));

    match conflict {
        Some(appt) => Err(ScheduleError::Conflict {
            appointment_id: appt.id.clone(),
            date: appt.date,
            start: appt.start,
            end: appt.end,
        }),
        None => Ok(()),
    }
}
