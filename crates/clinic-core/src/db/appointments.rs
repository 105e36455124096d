//! Appointment and appointment note database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{
    format_date, format_time, like_pattern, parse_date, parse_time, Database, DbError, DbResult,
};
use crate::models::{
    Appointment, AppointmentNote, AppointmentStatus, AppointmentType, NoteKind,
};

const APPOINTMENT_COLUMNS: &str = r#"
    a.id, a.patient_id, a.date, a.start_time, a.end_time, a.status,
    a.appointment_type, a.reason, a.created_at, a.updated_at
"#;

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, patient_id, date, start_time, end_time, status,
                appointment_type, reason, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                appointment.id,
                appointment.patient_id,
                format_date(&appointment.date),
                format_time(&appointment.start),
                format_time(&appointment.end),
                appointment.status.as_str(),
                appointment.appointment_type.as_str(),
                appointment.reason,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing appointment.
    pub fn update_appointment(&self, appointment: &Appointment) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                patient_id = ?2,
                date = ?3,
                start_time = ?4,
                end_time = ?5,
                status = ?6,
                appointment_type = ?7,
                reason = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                appointment.id,
                appointment.patient_id,
                format_date(&appointment.date),
                format_time(&appointment.start),
                format_time(&appointment.end),
                appointment.status.as_str(),
                appointment.appointment_type.as_str(),
                appointment.reason,
                appointment.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        let sql = format!("SELECT {} FROM appointments a WHERE a.id = ?", APPOINTMENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], AppointmentRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// All appointments of a patient on a date, ordered by start time.
    pub fn list_patient_appointments_on(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> DbResult<Vec<Appointment>> {
        let sql = format!(
            r#"
            SELECT {} FROM appointments a
            WHERE a.patient_id = ? AND a.date = ?
            ORDER BY a.start_time
            "#,
            APPOINTMENT_COLUMNS
        );
        self.query_appointments(&sql, params![patient_id, format_date(&date)])
    }

    /// All appointments of a patient, newest first.
    pub fn list_appointments_for_patient(&self, patient_id: &str) -> DbResult<Vec<Appointment>> {
        let sql = format!(
            r#"
            SELECT {} FROM appointments a
            WHERE a.patient_id = ?
            ORDER BY a.date DESC, a.start_time DESC
            "#,
            APPOINTMENT_COLUMNS
        );
        self.query_appointments(&sql, params![patient_id])
    }

    /// All appointments on a date, ordered by start time.
    pub fn list_appointments_on(&self, date: NaiveDate) -> DbResult<Vec<Appointment>> {
        let sql = format!(
            r#"
            SELECT {} FROM appointments a
            WHERE a.date = ?
            ORDER BY a.start_time, a.rowid
            "#,
            APPOINTMENT_COLUMNS
        );
        self.query_appointments(&sql, params![format_date(&date)])
    }

    /// Search appointments by patient name or reason, newest first.
    pub fn search_appointments(&self, query: &str, limit: usize) -> DbResult<Vec<Appointment>> {
        let pattern = like_pattern(query);
        let sql = format!(
            r#"
            SELECT {} FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            WHERE p.first_name LIKE ?1 ESCAPE '\' OR p.last_name LIKE ?1 ESCAPE '\'
               OR a.reason LIKE ?1 ESCAPE '\'
            ORDER BY a.date DESC, a.start_time DESC
            LIMIT ?2
            "#,
            APPOINTMENT_COLUMNS
        );
        self.query_appointments(&sql, params![pattern, limit as i64])
    }

    /// Count appointments on a date.
    pub fn count_appointments_on(&self, date: NaiveDate) -> DbResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE date = ?",
            [format_date(&date)],
            |row| row.get(0),
        )?)
    }

    /// Count appointments with a status.
    pub fn count_appointments_with_status(&self, status: AppointmentStatus) -> DbResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Delete an appointment. Its notes cascade.
    pub fn delete_appointment(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Append a note to an appointment.
    pub fn insert_appointment_note(&self, note: &AppointmentNote) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointment_notes (id, appointment_id, kind, body, author, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                note.id,
                note.appointment_id,
                note.kind.as_str(),
                note.body,
                note.author,
                note.created_at,
            ],
        )?;
        Ok(())
    }

    /// Notes of an appointment, oldest first.
    pub fn list_appointment_notes(&self, appointment_id: &str) -> DbResult<Vec<AppointmentNote>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, appointment_id, kind, body, author, created_at
            FROM appointment_notes
            WHERE appointment_id = ?
            ORDER BY created_at, rowid
            "#,
        )?;
        let rows = stmt.query_map([appointment_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut notes = Vec::new();
        for row in rows {
            let (id, appointment_id, kind, body, author, created_at) = row?;
            let kind = NoteKind::parse(&kind)
                .ok_or_else(|| DbError::Constraint(format!("Unknown note kind: {}", kind)))?;
            notes.push(AppointmentNote {
                id,
                appointment_id,
                kind,
                body,
                author,
                created_at,
            });
        }
        Ok(notes)
    }

    fn query_appointments(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    patient_id: String,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    appointment_type: String,
    reason: String,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            date: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            status: row.get(5)?,
            appointment_type: row.get(6)?,
            reason: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::parse(&row.status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown appointment status: {}", row.status))
        })?;
        let appointment_type = AppointmentType::parse(&row.appointment_type).ok_or_else(|| {
            DbError::Constraint(format!("Unknown appointment type: {}", row.appointment_type))
        })?;
        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            date: parse_date(&row.date)?,
            start: parse_time(&row.start_time)?,
            end: parse_time(&row.end_time)?,
            status,
            appointment_type,
            reason: row.reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;
    use chrono::NaiveTime;

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana".into(), "Pérez".into(), "V-1".into());
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn make_appointment(patient: &Patient, day: u32, start: NaiveTime, end: NaiveTime) -> Appointment {
        Appointment::new(
            patient.id.clone(),
            date(day),
            start,
            end,
            AppointmentType::Consultation,
            "Dolor de cabeza".into(),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let (db, patient) = setup_db();
        let appt = make_appointment(&patient, 10, time(9, 0), time(9, 30));
        db.insert_appointment(&appt).unwrap();

        let retrieved = db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(retrieved, appt);
    }

    #[test]
    fn test_update_status() {
        let (db, patient) = setup_db();
        let mut appt = make_appointment(&patient, 10, time(9, 0), time(9, 30));
        db.insert_appointment(&appt).unwrap();

        appt.status = AppointmentStatus::Completed;
        assert!(db.update_appointment(&appt).unwrap());

        let retrieved = db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(retrieved.status, AppointmentStatus::Completed);
        assert_eq!(
            db.count_appointments_with_status(AppointmentStatus::Completed).unwrap(),
            1
        );
    }

    #[test]
    fn test_end_before_start_rejected_by_storage() {
        let (db, patient) = setup_db();
        let appt = make_appointment(&patient, 10, time(10, 0), time(9, 0));
        assert!(db.insert_appointment(&appt).is_err());
    }

    #[test]
    fn test_list_by_patient_and_day() {
        let (db, patient) = setup_db();
        let other = Patient::new("Luis".into(), "Gómez".into(), "V-2".into());
        db.insert_patient(&other).unwrap();

        db.insert_appointment(&make_appointment(&patient, 10, time(11, 0), time(11, 30)))
            .unwrap();
        db.insert_appointment(&make_appointment(&patient, 10, time(9, 0), time(9, 30)))
            .unwrap();
        db.insert_appointment(&make_appointment(&patient, 11, time(9, 0), time(9, 30)))
            .unwrap();
        db.insert_appointment(&make_appointment(&other, 10, time(9, 0), time(9, 30)))
            .unwrap();

        let same_day = db.list_patient_appointments_on(&patient.id, date(10)).unwrap();
        assert_eq!(same_day.len(), 2);
        assert_eq!(same_day[0].start, time(9, 0));

        assert_eq!(db.list_appointments_on(date(10)).unwrap().len(), 3);
        assert_eq!(db.count_appointments_on(date(10)).unwrap(), 3);
        assert_eq!(db.list_appointments_for_patient(&patient.id).unwrap().len(), 3);
    }

    #[test]
    fn test_search_by_patient_name() {
        let (db, patient) = setup_db();
        db.insert_appointment(&make_appointment(&patient, 10, time(9, 0), time(9, 30)))
            .unwrap();

        assert_eq!(db.search_appointments("Pérez", 10).unwrap().len(), 1);
        assert_eq!(db.search_appointments("cabeza", 10).unwrap().len(), 1);
        assert!(db.search_appointments("Gómez", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let (db, patient) = setup_db();
        db.insert_appointment(&make_appointment(&patient, 10, time(9, 0), time(9, 30)))
            .unwrap();
        let mut discounted = make_appointment(&patient, 11, time(9, 0), time(9, 30));
        discounted.reason = "Control 100% cubierto".into();
        db.insert_appointment(&discounted).unwrap();

        assert!(db.search_appointments("_", 10).unwrap().is_empty());
        let found = db.search_appointments("%", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, discounted.id);
    }

    #[test]
    fn test_notes_cascade_with_appointment() {
        let (db, patient) = setup_db();
        let appt = make_appointment(&patient, 10, time(9, 0), time(9, 30));
        db.insert_appointment(&appt).unwrap();

        let note = AppointmentNote::new(&appt.id, NoteKind::Created, "Cita creada".into(), "ana");
        db.insert_appointment_note(&note).unwrap();
        assert_eq!(db.list_appointment_notes(&appt.id).unwrap(), vec![note]);

        db.delete_appointment(&appt.id).unwrap();
        assert!(db.list_appointment_notes(&appt.id).unwrap().is_empty());
    }
}
