//! Transactional appointment write path.

use chrono::{NaiveDate, NaiveTime, Timelike};

use super::validator::{validate, Candidate, Intent};
use crate::access::{authorize, Permission};
use crate::db::{format_time, Database};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{
    Appointment, AppointmentNote, AppointmentStatus, AppointmentType, NoteKind, UserProfile,
};

/// Fields submitted to book a new appointment.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    /// Defaults to the start plus the type's estimated duration
    pub end: Option<NaiveTime>,
    pub appointment_type: AppointmentType,
    pub reason: String,
}

/// Fields submitted when editing an appointment. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub patient_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
}

/// Appointment book manager.
///
/// Every write runs validate-then-persist inside one `IMMEDIATE`
/// transaction and records an audit note for the action.
pub struct AppointmentBook<'a> {
    db: &'a Database,
    today: NaiveDate,
}

impl<'a> AppointmentBook<'a> {
    /// Create a book that treats the local calendar date as today.
    pub fn new(db: &'a Database) -> Self {
        Self::with_today(db, chrono::Local::now().date_naive())
    }

    /// Create a book with a fixed notion of today.
    pub fn with_today(db: &'a Database, today: NaiveDate) -> Self {
        Self { db, today }
    }

    /// Book a new appointment.
    pub fn book(&self, actor: &UserProfile, request: BookingRequest) -> ClinicResult<Appointment> {
        authorize(actor, Permission::ManageAppointments)?;

        let start = truncate_to_minute(request.start);
        let end = match request.end {
            Some(end) => truncate_to_minute(end),
            None => request.appointment_type.default_end(start).ok_or_else(|| {
                ClinicError::InvalidInput(format!(
                    "A {} starting at {} would end after midnight",
                    request.appointment_type.as_str(),
                    format_time(&start)
                ))
            })?,
        };

        let tx = self.db.begin_immediate()?;

        if self.db.get_patient(&request.patient_id)?.is_none() {
            return Err(ClinicError::NotFound(format!(
                "patient {}",
                request.patient_id
            )));
        }

        let candidate = Candidate::new(request.patient_id.clone(), request.date, start, end);
        let existing = self
            .db
            .list_patient_appointments_on(&request.patient_id, request.date)?;
        if let Err(e) = validate(&candidate, &existing, Intent::Create, self.today) {
            tracing::warn!(patient_id = %request.patient_id, error = %e, "booking rejected");
            return Err(e.into());
        }

        let appointment = Appointment::new(
            request.patient_id,
            request.date,
            start,
            end,
            request.appointment_type,
            request.reason,
        );
        self.db.insert_appointment(&appointment)?;
        self.db.insert_appointment_note(&AppointmentNote::new(
            &appointment.id,
            NoteKind::Created,
            format!(
                "Appointment booked for {} from {} to {}",
                appointment.date,
                format_time(&appointment.start),
                format_time(&appointment.end)
            ),
            &actor.username,
        ))?;

        tx.commit()?;
        tracing::info!(
            appointment_id = %appointment.id,
            patient_id = %appointment.patient_id,
            date = %appointment.date,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// Edit an existing appointment. Past appointments remain editable.
    pub fn reschedule(
        &self,
        actor: &UserProfile,
        appointment_id: &str,
        changes: AppointmentChanges,
    ) -> ClinicResult<Appointment> {
        authorize(actor, Permission::ManageAppointments)?;

        let tx = self.db.begin_immediate()?;
        let mut appointment = self.require(appointment_id)?;

        if let Some(patient_id) = changes.patient_id {
            if self.db.get_patient(&patient_id)?.is_none() {
                return Err(ClinicError::NotFound(format!("patient {}", patient_id)));
            }
            appointment.patient_id = patient_id;
        }
        if let Some(date) = changes.date {
            appointment.date = date;
        }
        if let Some(start) = changes.start {
            appointment.start = truncate_to_minute(start);
        }
        if let Some(end) = changes.end {
            appointment.end = truncate_to_minute(end);
        }
        if let Some(appointment_type) = changes.appointment_type {
            appointment.appointment_type = appointment_type;
        }
        if let Some(reason) = changes.reason {
            appointment.reason = reason;
        }

        let candidate = Candidate::from_appointment(&appointment);
        let existing = self
            .db
            .list_patient_appointments_on(&appointment.patient_id, appointment.date)?;
        if let Err(e) = validate(
            &candidate,
            &existing,
            Intent::Edit { appointment_id },
            self.today,
        ) {
            tracing::warn!(appointment_id, error = %e, "edit rejected");
            return Err(e.into());
        }

        appointment.touch();
        self.db.update_appointment(&appointment)?;
        self.db.insert_appointment_note(&AppointmentNote::new(
            appointment_id,
            NoteKind::Edited,
            format!(
                "Appointment updated: {} from {} to {}",
                appointment.date,
                format_time(&appointment.start),
                format_time(&appointment.end)
            ),
            &actor.username,
        ))?;

        tx.commit()?;
        tracing::info!(appointment_id, "appointment updated");
        Ok(appointment)
    }

    /// Change the status of an appointment.
    pub fn change_status(
        &self,
        actor: &UserProfile,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> ClinicResult<Appointment> {
        authorize(actor, Permission::ManageAppointments)?;

        let tx = self.db.begin_immediate()?;
        let mut appointment = self.require(appointment_id)?;
        let previous = appointment.status;

        appointment.status = status;
        appointment.touch();
        self.db.update_appointment(&appointment)?;
        self.db.insert_appointment_note(&AppointmentNote::new(
            appointment_id,
            NoteKind::StatusChanged,
            format!(
                "Status changed from {} to {}",
                previous.as_str(),
                status.as_str()
            ),
            &actor.username,
        ))?;

        tx.commit()?;
        tracing::info!(
            appointment_id,
            from = previous.as_str(),
            to = status.as_str(),
            "appointment status changed"
        );
        Ok(appointment)
    }

    /// Cancel an appointment.
    pub fn cancel(&self, actor: &UserProfile, appointment_id: &str) -> ClinicResult<Appointment> {
        self.change_status(actor, appointment_id, AppointmentStatus::Cancelled)
    }

    /// Attach a free-text staff note.
    pub fn add_note(
        &self,
        actor: &UserProfile,
        appointment_id: &str,
        body: &str,
    ) -> ClinicResult<AppointmentNote> {
        authorize(actor, Permission::ManageAppointments)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(ClinicError::InvalidInput("note body is empty".into()));
        }

        let tx = self.db.begin_immediate()?;
        self.require(appointment_id)?;
        let note = AppointmentNote::new(appointment_id, NoteKind::Manual, body.to_string(), &actor.username);
        self.db.insert_appointment_note(&note)?;
        tx.commit()?;
        Ok(note)
    }

    /// Delete an appointment and its notes.
    pub fn delete(&self, actor: &UserProfile, appointment_id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManageAppointments)?;

        if !self.db.delete_appointment(appointment_id)? {
            return Err(ClinicError::NotFound(format!("appointment {}", appointment_id)));
        }
        tracing::info!(appointment_id, username = %actor.username, "appointment deleted");
        Ok(())
    }

    pub fn get(&self, appointment_id: &str) -> ClinicResult<Appointment> {
        self.require(appointment_id)
    }

    pub fn notes(&self, appointment_id: &str) -> ClinicResult<Vec<AppointmentNote>> {
        Ok(self.db.list_appointment_notes(appointment_id)?)
    }

    /// Agenda for a day, ordered by start time.
    pub fn list_for_day(&self, date: NaiveDate) -> ClinicResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_on(date)?)
    }

    /// Agenda for today.
    pub fn list_today(&self) -> ClinicResult<Vec<Appointment>> {
        self.list_for_day(self.today)
    }

    pub fn list_for_patient(&self, patient_id: &str) -> ClinicResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_for_patient(patient_id)?)
    }

    pub fn search(&self, query: &str, limit: usize) -> ClinicResult<Vec<Appointment>> {
        Ok(self.db.search_appointments(query, limit)?)
    }

    fn require(&self, appointment_id: &str) -> ClinicResult<Appointment> {
        self.db
            .get_appointment(appointment_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("appointment {}", appointment_id)))
    }
}

/// Appointments are stored at minute resolution.
fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}
