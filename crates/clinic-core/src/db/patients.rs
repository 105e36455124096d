//! Patient and medical history database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_date, like_pattern, parse_date, Database, DbError, DbResult};
use crate::models::{Gender, MedicalHistory, Patient};

const PATIENT_COLUMNS: &str = r#"
    id, first_name, last_name, document_number, birth_date, gender,
    phone, address, email, created_at, updated_at
"#;

const HISTORY_COLUMNS: &str = r#"
    h.patient_id, h.allergies, h.pre_existing_conditions, h.current_medications,
    h.created_at, h.updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, first_name, last_name, document_number, birth_date, gender,
                phone, address, email, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                patient.id,
                patient.first_name,
                patient.last_name,
                patient.document_number,
                patient.birth_date.as_ref().map(format_date),
                patient.gender.as_str(),
                patient.phone,
                patient.address,
                patient.email,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                first_name = ?2,
                last_name = ?3,
                document_number = ?4,
                birth_date = ?5,
                gender = ?6,
                phone = ?7,
                address = ?8,
                email = ?9,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.first_name,
                patient.last_name,
                patient.document_number,
                patient.birth_date.as_ref().map(format_date),
                patient.gender.as_str(),
                patient.phone,
                patient.address,
                patient.email,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get the patient holding a document number, if any.
    pub fn get_patient_by_document(&self, document_number: &str) -> DbResult<Option<Patient>> {
        let sql = format!(
            "SELECT {} FROM patients WHERE document_number = ?",
            PATIENT_COLUMNS
        );
        self.conn
            .query_row(&sql, [document_number], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search patients by first name, last name or document (substring match).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = like_pattern(query);
        let sql = format!(
            r#"
            SELECT {} FROM patients
            WHERE first_name LIKE ?1 ESCAPE '\' OR last_name LIKE ?1 ESCAPE '\'
               OR document_number LIKE ?1 ESCAPE '\'
            ORDER BY last_name, first_name
            LIMIT ?2
            "#,
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern, limit as i64], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List all patients ordered by last name, first name.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let sql = format!(
            "SELECT {} FROM patients ORDER BY last_name, first_name",
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Delete a patient. Appointments, notes and history cascade.
    pub fn delete_patient(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Insert a medical history row.
    pub fn insert_medical_history(&self, history: &MedicalHistory) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medical_histories (
                patient_id, allergies, pre_existing_conditions, current_medications,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                history.patient_id,
                history.allergies,
                history.pre_existing_conditions,
                history.current_medications,
                history.created_at,
                history.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update a patient's medical history.
    pub fn update_medical_history(&self, history: &MedicalHistory) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE medical_histories SET
                allergies = ?2,
                pre_existing_conditions = ?3,
                current_medications = ?4,
                updated_at = datetime('now')
            WHERE patient_id = ?1
            "#,
            params![
                history.patient_id,
                history.allergies,
                history.pre_existing_conditions,
                history.current_medications,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient's medical history.
    pub fn get_medical_history(&self, patient_id: &str) -> DbResult<Option<MedicalHistory>> {
        let sql = format!(
            "SELECT {} FROM medical_histories h WHERE h.patient_id = ?",
            HISTORY_COLUMNS
        );
        self.conn
            .query_row(&sql, [patient_id], history_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All medical histories, ordered by the patient's name.
    pub fn list_medical_histories(&self) -> DbResult<Vec<MedicalHistory>> {
        let sql = format!(
            r#"
            SELECT {} FROM medical_histories h
            JOIN patients p ON p.id = h.patient_id
            ORDER BY p.last_name, p.first_name
            "#,
            HISTORY_COLUMNS
        );
        self.query_histories(&sql, [])
    }

    /// Medical histories whose patient's first or last name contains `query`.
    pub fn search_medical_histories(
        &self,
        query: &str,
        limit: usize,
    ) -> DbResult<Vec<MedicalHistory>> {
        let pattern = like_pattern(query);
        let sql = format!(
            r#"
            SELECT {} FROM medical_histories h
            JOIN patients p ON p.id = h.patient_id
            WHERE p.first_name LIKE ?1 ESCAPE '\' OR p.last_name LIKE ?1 ESCAPE '\'
            ORDER BY p.last_name, p.first_name
            LIMIT ?2
            "#,
            HISTORY_COLUMNS
        );
        self.query_histories(&sql, params![pattern, limit as i64])
    }

    /// Delete a patient's medical history; the patient stays.
    pub fn delete_medical_history(&self, patient_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM medical_histories WHERE patient_id = ?", [patient_id])?;
        Ok(rows_affected > 0)
    }

    fn query_histories<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> DbResult<Vec<MedicalHistory>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, history_from_row)?;

        let mut histories = Vec::new();
        for row in rows {
            histories.push(row?);
        }
        Ok(histories)
    }
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalHistory> {
    Ok(MedicalHistory {
        patient_id: row.get(0)?,
        allergies: row.get(1)?,
        pre_existing_conditions: row.get(2)?,
        current_medications: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    first_name: String,
    last_name: String,
    document_number: String,
    birth_date: Option<String>,
    gender: String,
    phone: String,
    address: String,
    email: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            document_number: row.get(3)?,
            birth_date: row.get(4)?,
            gender: row.get(5)?,
            phone: row.get(6)?,
            address: row.get(7)?,
            email: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let gender = Gender::parse(&row.gender)
            .ok_or_else(|| DbError::Constraint(format!("Unknown gender: {}", row.gender)))?;
        Ok(Patient {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            document_number: row.document_number,
            birth_date: row.birth_date.as_deref().map(parse_date).transpose()?,
            gender,
            phone: row.phone,
            address: row.address,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_patient(first: &str, last: &str, document: &str) -> Patient {
        let mut patient = Patient::new(first.into(), last.into(), document.into());
        patient.gender = Gender::Female;
        patient
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = make_patient("Ana", "Pérez", "V-1");
        patient.birth_date = NaiveDate::from_ymd_opt(1990, 6, 15);
        patient.email = Some("ana@example.com".into());

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.first_name, "Ana");
        assert_eq!(retrieved.gender, Gender::Female);
        assert_eq!(retrieved.birth_date, patient.birth_date);
        assert_eq!(retrieved.email, Some("ana@example.com".into()));
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();

        let mut patient = make_patient("Ana", "Pérez", "V-1");
        db.insert_patient(&patient).unwrap();

        patient.phone = "04141234567".into();
        patient.address = "Av. Bolívar 12".into();
        assert!(db.update_patient(&patient).unwrap());

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.phone, "04141234567");
        assert_eq!(retrieved.address, "Av. Bolívar 12");
    }

    #[test]
    fn test_search_patients() {
        let db = setup_db();

        db.insert_patient(&make_patient("Ana", "Pérez", "V-1")).unwrap();
        db.insert_patient(&make_patient("Mariana", "López", "V-2")).unwrap();
        db.insert_patient(&make_patient("Luis", "Gómez", "E-77")).unwrap();

        let results = db.search_patients("ana", 10).unwrap();
        assert_eq!(results.len(), 2);

        let results = db.search_patients("E-77", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].first_name, "Luis");
    }

    #[test]
    fn test_get_by_document() {
        let db = setup_db();
        let patient = make_patient("Ana", "Pérez", "V-1");
        db.insert_patient(&patient).unwrap();

        let found = db.get_patient_by_document("V-1").unwrap().unwrap();
        assert_eq!(found.id, patient.id);
        assert!(db.get_patient_by_document("V-2").unwrap().is_none());
    }

    #[test]
    fn test_medical_history_cascade() {
        let db = setup_db();
        let patient = make_patient("Ana", "Pérez", "V-1");
        db.insert_patient(&patient).unwrap();

        let mut history = MedicalHistory::empty_for(&patient.id);
        db.insert_medical_history(&history).unwrap();

        history.allergies = Some("Penicilina".into());
        assert!(db.update_medical_history(&history).unwrap());
        let stored = db.get_medical_history(&patient.id).unwrap().unwrap();
        assert_eq!(stored.allergies, Some("Penicilina".into()));

        assert!(db.delete_patient(&patient.id).unwrap());
        assert!(db.get_medical_history(&patient.id).unwrap().is_none());
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let db = setup_db();
        db.insert_patient(&make_patient("Ana", "Pérez", "V-1")).unwrap();
        db.insert_patient(&make_patient("Ana_María", "Sosa", "V_2")).unwrap();

        assert!(db.search_patients("%", 10).unwrap().is_empty());
        let results = db.search_patients("_", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].first_name, "Ana_María");
    }

    fn with_history(db: &Database, first: &str, last: &str, document: &str) -> Patient {
        let patient = make_patient(first, last, document);
        db.insert_patient(&patient).unwrap();
        db.insert_medical_history(&MedicalHistory::empty_for(&patient.id))
            .unwrap();
        patient
    }

    #[test]
    fn test_list_medical_histories() {
        let db = setup_db();
        let zoe = with_history(&db, "Zoe", "Vargas", "V-1");
        let ana = with_history(&db, "Ana", "Pérez", "V-2");
        db.insert_patient(&make_patient("Luis", "Gómez", "V-3")).unwrap();

        let histories = db.list_medical_histories().unwrap();
        let ids: Vec<&str> = histories.iter().map(|h| h.patient_id.as_str()).collect();
        assert_eq!(ids, vec![ana.id.as_str(), zoe.id.as_str()]);
    }

    #[test]
    fn test_search_medical_histories_by_patient_name() {
        let db = setup_db();
        let ana = with_history(&db, "Ana", "Pérez", "V-1");
        let mariana = with_history(&db, "Mariana", "López", "V-2");
        with_history(&db, "Luis", "Gómez", "V-3");

        let found = db.search_medical_histories("ana", 10).unwrap();
        let mut ids: Vec<String> = found.into_iter().map(|h| h.patient_id).collect();
        ids.sort();
        let mut expected = vec![ana.id, mariana.id];
        expected.sort();
        assert_eq!(ids, expected);

        // Documents are not part of the history search.
        assert!(db.search_medical_histories("V-3", 10).unwrap().is_empty());
        assert!(db.search_medical_histories("%", 10).unwrap().is_empty());
        assert_eq!(db.search_medical_histories("Gómez", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_medical_history_keeps_patient() {
        let db = setup_db();
        let patient = with_history(&db, "Ana", "Pérez", "V-1");

        assert!(db.delete_medical_history(&patient.id).unwrap());
        assert!(!db.delete_medical_history(&patient.id).unwrap());
        assert!(db.get_medical_history(&patient.id).unwrap().is_none());
        assert!(db.get_patient(&patient.id).unwrap().is_some());
    }
}
