//! Patient registry and medical histories.

use crate::access::{authorize, Permission};
use crate::db::Database;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{MedicalHistory, Patient, UserProfile};

/// Patient registry manager.
pub struct PatientRegistry<'a> {
    db: &'a Database,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a patient together with their empty medical history.
    pub fn register(&self, actor: &UserProfile, patient: Patient) -> ClinicResult<Patient> {
        authorize(actor, Permission::ManagePatients)?;
        let patient = normalize(patient)?;

        let tx = self.db.begin_immediate()?;
        if self.db.get_patient_by_document(&patient.document_number)?.is_some() {
            tracing::warn!(document = %patient.document_number, "duplicate document rejected");
            return Err(ClinicError::DuplicateDocument(patient.document_number));
        }

        self.db.insert_patient(&patient)?;
        self.db
            .insert_medical_history(&MedicalHistory::empty_for(&patient.id))?;

        tx.commit()?;
        tracing::info!(patient_id = %patient.id, "patient registered");
        Ok(patient)
    }

    pub fn update(&self, actor: &UserProfile, patient: Patient) -> ClinicResult<Patient> {
        authorize(actor, Permission::ManagePatients)?;
        let mut patient = normalize(patient)?;

        let tx = self.db.begin_immediate()?;
        if let Some(other) = self.db.get_patient_by_document(&patient.document_number)? {
            if other.id != patient.id {
                return Err(ClinicError::DuplicateDocument(patient.document_number));
            }
        }

        patient.updated_at = chrono::Utc::now().to_rfc3339();
        if !self.db.update_patient(&patient)? {
            return Err(ClinicError::NotFound(format!("patient {}", patient.id)));
        }

        tx.commit()?;
        tracing::info!(patient_id = %patient.id, "patient updated");
        Ok(patient)
    }

    /// Delete a patient with their appointments and history.
    pub fn delete(&self, actor: &UserProfile, patient_id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManagePatients)?;
        if !self.db.delete_patient(patient_id)? {
            return Err(ClinicError::NotFound(format!("patient {}", patient_id)));
        }
        tracing::info!(patient_id, username = %actor.username, "patient deleted");
        Ok(())
    }

    pub fn get(&self, patient_id: &str) -> ClinicResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("patient {}", patient_id)))
    }

    pub fn get_by_document(&self, document_number: &str) -> ClinicResult<Patient> {
        self.db
            .get_patient_by_document(document_number.trim())?
            .ok_or_else(|| ClinicError::NotFound(format!("patient {}", document_number)))
    }

    pub fn list(&self) -> ClinicResult<Vec<Patient>> {
        Ok(self.db.list_patients()?)
    }

    /// Substring search over first name, last name and document number.
    pub fn search(&self, query: &str, limit: usize) -> ClinicResult<Vec<Patient>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.search_patients(query, limit)?)
    }

    pub fn history(&self, actor: &UserProfile, patient_id: &str) -> ClinicResult<MedicalHistory> {
        authorize(actor, Permission::ViewMedicalHistory)?;
        self.db
            .get_medical_history(patient_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("medical history for {}", patient_id)))
    }

    /// Histories of every patient, ordered by patient name.
    pub fn list_histories(&self, actor: &UserProfile) -> ClinicResult<Vec<MedicalHistory>> {
        authorize(actor, Permission::ViewMedicalHistory)?;
        Ok(self.db.list_medical_histories()?)
    }

    /// Histories whose patient's first or last name contains `query`.
    pub fn search_histories(
        &self,
        actor: &UserProfile,
        query: &str,
        limit: usize,
    ) -> ClinicResult<Vec<MedicalHistory>> {
        authorize(actor, Permission::ViewMedicalHistory)?;
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.search_medical_histories(query, limit)?)
    }

    /// Remove a patient's medical history. The patient record is kept.
    pub fn delete_history(&self, actor: &UserProfile, patient_id: &str) -> ClinicResult<()> {
        authorize(actor, Permission::EditMedicalHistory)?;
        if !self.db.delete_medical_history(patient_id)? {
            return Err(ClinicError::NotFound(format!("medical history for {}", patient_id)));
        }
        tracing::info!(patient_id, username = %actor.username, "medical history deleted");
        Ok(())
    }

    /// Create or replace a patient's medical history.
    pub fn save_history(
        &self,
        actor: &UserProfile,
        mut history: MedicalHistory,
    ) -> ClinicResult<MedicalHistory> {
        authorize(actor, Permission::EditMedicalHistory)?;

        let tx = self.db.begin_immediate()?;
        if self.db.get_patient(&history.patient_id)?.is_none() {
            return Err(ClinicError::NotFound(format!("patient {}", history.patient_id)));
        }

        history.updated_at = chrono::Utc::now().to_rfc3339();
        if !self.db.update_medical_history(&history)? {
            history.created_at = history.updated_at.clone();
            self.db.insert_medical_history(&history)?;
        }

        tx.commit()?;
        tracing::info!(patient_id = %history.patient_id, "medical history saved");
        Ok(history)
    }
}

fn normalize(mut patient: Patient) -> ClinicResult<Patient> {
    patient.first_name = patient.first_name.trim().to_string();
    patient.last_name = patient.last_name.trim().to_string();
    patient.document_number = patient.document_number.trim().to_string();

    if patient.first_name.is_empty() || patient.last_name.is_empty() {
        return Err(ClinicError::InvalidInput("first and last name are required".into()));
    }
    if patient.document_number.is_empty() {
        return Err(ClinicError::InvalidInput("document number is required".into()));
    }
    Ok(patient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn receptionist() -> UserProfile {
        UserProfile::new("recepcion".into(), Role::Receptionist)
    }

    fn doctor() -> UserProfile {
        UserProfile::new("dr.mora".into(), Role::Doctor)
    }

    fn patient(document: &str) -> Patient {
        Patient::new("Ana".into(), "Pérez".into(), document.into())
    }

    #[test]
    fn test_register_opens_history() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);

        let p = registry.register(&receptionist(), patient("V-100")).unwrap();
        let history = registry.history(&doctor(), &p.id).unwrap();
        assert_eq!(history.patient_id, p.id);
        assert!(history.allergies.is_none());
    }

    #[test]
    fn test_failed_registration_leaves_no_history() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);

        assert!(matches!(
            registry.register(&receptionist(), Patient::new("Ana".into(), " ".into(), "V-1".into())),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(matches!(
            registry.register(&receptionist(), patient("  ")),
            Err(ClinicError::InvalidInput(_))
        ));
        assert_eq!(db.count_rows("patients").unwrap(), 0);
        assert_eq!(db.count_rows("medical_histories").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_document() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        registry.register(&receptionist(), patient("V-100")).unwrap();

        let err = registry
            .register(&receptionist(), patient(" V-100 "))
            .unwrap_err();
        assert!(matches!(err, ClinicError::DuplicateDocument(ref d) if d == "V-100"));
        assert_eq!(registry.list().unwrap().len(), 1);
        assert_eq!(db.count_rows("medical_histories").unwrap(), 1);
    }

    #[test]
    fn test_update_into_taken_document() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        registry.register(&receptionist(), patient("V-1")).unwrap();
        let mut second = registry.register(&receptionist(), patient("V-2")).unwrap();

        second.document_number = "V-1".into();
        assert!(matches!(
            registry.update(&receptionist(), second.clone()),
            Err(ClinicError::DuplicateDocument(_))
        ));

        second.document_number = "V-2".into();
        second.phone = "04141234567".into();
        let saved = registry.update(&receptionist(), second).unwrap();
        assert_eq!(registry.get(&saved.id).unwrap().phone, "04141234567");
    }

    #[test]
    fn test_history_requires_doctor() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        let p = registry.register(&receptionist(), patient("V-1")).unwrap();

        assert!(matches!(
            registry.history(&receptionist(), &p.id),
            Err(ClinicError::PermissionDenied { .. })
        ));

        let mut history = registry.history(&doctor(), &p.id).unwrap();
        history.allergies = Some("Penicilina".into());
        registry.save_history(&doctor(), history).unwrap();
        assert_eq!(
            registry.history(&doctor(), &p.id).unwrap().allergies.as_deref(),
            Some("Penicilina")
        );
    }

    #[test]
    fn test_save_history_creates_when_missing() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        let p = registry.register(&receptionist(), patient("V-1")).unwrap();
        registry.delete_history(&doctor(), &p.id).unwrap();

        let mut history = MedicalHistory::empty_for(&p.id);
        history.current_medications = Some("Losartán".into());
        registry.save_history(&doctor(), history).unwrap();
        assert!(registry.history(&doctor(), &p.id).is_ok());
    }

    #[test]
    fn test_search_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        let p = registry.register(&receptionist(), patient("V-12345")).unwrap();

        assert_eq!(registry.search("123", 10).unwrap().len(), 1);
        assert_eq!(registry.search("pérez", 10).unwrap().len(), 1);
        assert!(registry.search("gomez", 10).unwrap().is_empty());
        assert!(registry.search("  ", 10).unwrap().is_empty());

        registry.delete(&receptionist(), &p.id).unwrap();
        assert!(matches!(registry.get(&p.id), Err(ClinicError::NotFound(_))));
        assert_eq!(db.count_rows("medical_histories").unwrap(), 0);
    }

    #[test]
    fn test_list_histories() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        let zoe = registry
            .register(&receptionist(), Patient::new("Zoe".into(), "Vargas".into(), "V-1".into()))
            .unwrap();
        let ana = registry.register(&receptionist(), patient("V-2")).unwrap();

        assert!(matches!(
            registry.list_histories(&receptionist()),
            Err(ClinicError::PermissionDenied { .. })
        ));
        let ids: Vec<String> = registry
            .list_histories(&doctor())
            .unwrap()
            .into_iter()
            .map(|h| h.patient_id)
            .collect();
        assert_eq!(ids, vec![ana.id, zoe.id]);
    }

    #[test]
    fn test_search_histories_by_name() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        let ana = registry.register(&receptionist(), patient("V-1")).unwrap();
        registry
            .register(&receptionist(), Patient::new("Luis".into(), "Gómez".into(), "V-2".into()))
            .unwrap();

        let found = registry.search_histories(&doctor(), " pérez ", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].patient_id, ana.id);
        assert_eq!(registry.search_histories(&doctor(), "luis", 10).unwrap().len(), 1);
        assert!(registry.search_histories(&doctor(), "", 10).unwrap().is_empty());
        assert!(matches!(
            registry.search_histories(&receptionist(), "ana", 10),
            Err(ClinicError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_delete_history() {
        let db = Database::open_in_memory().unwrap();
        let registry = PatientRegistry::new(&db);
        let p = registry.register(&receptionist(), patient("V-1")).unwrap();

        assert!(matches!(
            registry.delete_history(&receptionist(), &p.id),
            Err(ClinicError::PermissionDenied { .. })
        ));
        registry.delete_history(&doctor(), &p.id).unwrap();
        assert!(matches!(
            registry.history(&doctor(), &p.id),
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete_history(&doctor(), &p.id),
            Err(ClinicError::NotFound(_))
        ));
        assert!(registry.get(&p.id).is_ok());
    }
}
