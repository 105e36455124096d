//! Clinic Core Library
//!
//! Patient records, appointment scheduling, medical histories and
//! medicine inventory for a small clinic, on a local SQLite store.
//!
//! # Architecture
//!
//! ```text
//!   ClinicCore (FFI) / clinic-admin (CLI)
//!                 │
//!        resolve acting user → authorize(permission)
//!                 │
//!   ┌─────────────┼──────────────────┬───────────────────┐
//!   ▼             ▼                  ▼                   ▼
//! PatientRegistry AppointmentBook    Inventory           Exports
//!                 │                  │
//!         BEGIN IMMEDIATE     BEGIN IMMEDIATE
//!         validate()          check_exit() / assign_code()
//!         write + audit note  append hash-chained movement
//!         COMMIT              COMMIT
//! ```
//!
//! # Core Principles
//!
//! - A patient's appointments never overlap on the same date.
//! - Stock is always derived from the movement ledger, never stored.
//! - Medicine codes are assigned once and never change.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 search
//! - [`models`]: Domain types (Patient, Appointment, Medicine, etc.)
//! - [`scheduling`]: Conflict validator and appointment book
//! - [`inventory`]: Codes, ledger-derived stock and the inventory service
//! - [`patients`]: Patient registry and medical histories
//! - [`access`]: Roles, permissions and staff profiles
//! - [`export`]: Stock report and daily agenda export

pub mod access;
pub mod admin;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod inventory;
pub mod models;
pub mod patients;
pub mod scheduling;

// Re-export commonly used types
pub use access::{authorize, Permission, StaffDirectory};
pub use config::{ClinicConfig, ConfigError};
pub use db::Database;
pub use error::{ClinicError, ClinicResult};
pub use inventory::{Inventory, LedgerReport, LotView, MedicineChanges, NewMedicine, StockError, StockLevel};
pub use models::{
    Appointment, AppointmentNote, AppointmentStatus, AppointmentType, Category, Gender,
    InventoryLot, InventoryMovement, LotStatus, MedicalHistory, Medicine, MovementKind, Patient,
    Role, StockStatus, Supplier, UserProfile,
};
pub use patients::PatientRegistry;
pub use scheduling::{AppointmentBook, AppointmentChanges, BookingRequest, ScheduleError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicCoreError {
    #[error("{0}")]
    InvalidInterval(String),

    #[error("{0}")]
    PastDate(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    DuplicateDocument(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ClinicError> for ClinicCoreError {
    fn from(e: ClinicError) -> Self {
        let message = e.to_string();
        match e {
            ClinicError::Schedule(ScheduleError::InvalidInterval { .. }) => {
                ClinicCoreError::InvalidInterval(message)
            }
            ClinicError::Schedule(ScheduleError::PastDate { .. }) => ClinicCoreError::PastDate(message),
            ClinicError::Schedule(ScheduleError::Conflict { .. }) => ClinicCoreError::Conflict(message),
            ClinicError::Stock(StockError::InsufficientStock { .. }) => {
                ClinicCoreError::InsufficientStock(message)
            }
            ClinicError::Stock(StockError::NonPositiveQuantity(_)) => {
                ClinicCoreError::InvalidInput(message)
            }
            ClinicError::DuplicateDocument(_) => ClinicCoreError::DuplicateDocument(message),
            ClinicError::InvalidInput(detail) => ClinicCoreError::InvalidInput(detail),
            ClinicError::NotFound(detail) => ClinicCoreError::NotFound(detail),
            ClinicError::PermissionDenied { .. } => ClinicCoreError::PermissionDenied(message),
            ClinicError::Database(inner) => ClinicCoreError::DatabaseError(inner.to_string()),
        }
    }
}

impl From<db::DbError> for ClinicCoreError {
    fn from(e: db::DbError) -> Self {
        ClinicCoreError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicCoreError {
    fn from(e: serde_json::Error) -> Self {
        ClinicCoreError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicCoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicCoreError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

type FfiResult<T> = Result<T, ClinicCoreError>;

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> FfiResult<Arc<ClinicCore>> {
    let db = Database::open(&path)?;
    tracing::info!(path = %path, "clinic database opened");
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> FfiResult<Arc<ClinicCore>> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
///
/// Every method taking `actor` resolves that username to a staff profile
/// and checks its role before doing anything else.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Staff
    // =========================================================================

    /// Create the first admin profile of a fresh database.
    pub fn bootstrap_admin(&self, username: String) -> FfiResult<FfiUser> {
        let db = self.db.lock()?;
        Ok(StaffDirectory::new(&db).bootstrap_admin(&username)?.into())
    }

    pub fn create_user(&self, actor: String, username: String, role: String) -> FfiResult<FfiUser> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let user = StaffDirectory::new(&db).create(&actor, &username, parse_role(&role)?)?;
        Ok(user.into())
    }

    pub fn set_user_role(&self, actor: String, username: String, role: String) -> FfiResult<FfiUser> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let user = StaffDirectory::new(&db).set_role(&actor, &username, parse_role(&role)?)?;
        Ok(user.into())
    }

    pub fn list_users(&self, actor: String) -> FfiResult<Vec<FfiUser>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageUsers)?;
        let users = StaffDirectory::new(&db).list()?;
        Ok(users.into_iter().map(|u| u.into()).collect())
    }

    pub fn delete_user(&self, actor: String, username: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        StaffDirectory::new(&db).delete(&actor, &username)?;
        Ok(())
    }

    /// Whether the user's role allows a permission, e.g. "dispense_medicine".
    pub fn can(&self, username: String, permission: String) -> FfiResult<bool> {
        let db = self.db.lock()?;
        let user = resolve_actor(&db, &username)?;
        let permission = parse_permission(&permission)?;
        Ok(access::role_allows(user.role, permission))
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Register a patient together with an empty medical history.
    pub fn register_patient(&self, actor: String, patient: FfiPatientInput) -> FfiResult<FfiPatient> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let patient = patient.into_patient(None)?;
        let saved = PatientRegistry::new(&db).register(&actor, patient)?;
        Ok(saved.into())
    }

    pub fn update_patient(
        &self,
        actor: String,
        patient_id: String,
        patient: FfiPatientInput,
    ) -> FfiResult<FfiPatient> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let registry = PatientRegistry::new(&db);
        let existing = registry.get(&patient_id)?;
        let patient = patient.into_patient(Some(existing))?;
        Ok(registry.update(&actor, patient)?.into())
    }

    pub fn get_patient(&self, actor: String, patient_id: String) -> FfiResult<Option<FfiPatient>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManagePatients)?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    pub fn get_patient_by_document(&self, actor: String, document_number: String) -> FfiResult<FfiPatient> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManagePatients)?;
        Ok(PatientRegistry::new(&db).get_by_document(&document_number)?.into())
    }

    pub fn list_patients(&self, actor: String) -> FfiResult<Vec<FfiPatient>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManagePatients)?;
        let patients = PatientRegistry::new(&db).list()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn search_patients(&self, actor: String, query: String, limit: u32) -> FfiResult<Vec<FfiPatient>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManagePatients)?;
        let patients = PatientRegistry::new(&db).search(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn delete_patient(&self, actor: String, patient_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        PatientRegistry::new(&db).delete(&actor, &patient_id)?;
        Ok(())
    }

    pub fn get_medical_history(&self, actor: String, patient_id: String) -> FfiResult<FfiMedicalHistory> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        Ok(PatientRegistry::new(&db).history(&actor, &patient_id)?.into())
    }

    pub fn list_medical_histories(&self, actor: String) -> FfiResult<Vec<FfiMedicalHistory>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let histories = PatientRegistry::new(&db).list_histories(&actor)?;
        Ok(histories.into_iter().map(|h| h.into()).collect())
    }

    /// Histories whose patient's first or last name matches `query`.
    pub fn search_medical_histories(
        &self,
        actor: String,
        query: String,
        limit: u32,
    ) -> FfiResult<Vec<FfiMedicalHistory>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let histories = PatientRegistry::new(&db).search_histories(&actor, &query, limit as usize)?;
        Ok(histories.into_iter().map(|h| h.into()).collect())
    }

    pub fn delete_medical_history(&self, actor: String, patient_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        PatientRegistry::new(&db).delete_history(&actor, &patient_id)?;
        Ok(())
    }

    pub fn save_medical_history(
        &self,
        actor: String,
        history: FfiMedicalHistory,
    ) -> FfiResult<FfiMedicalHistory> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let mut record = MedicalHistory::empty_for(&history.patient_id);
        record.allergies = history.allergies;
        record.pre_existing_conditions = history.pre_existing_conditions;
        record.current_medications = history.current_medications;
        Ok(PatientRegistry::new(&db).save_history(&actor, record)?.into())
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    /// Book an appointment. Rejections carry a message for the user.
    pub fn book_appointment(&self, actor: String, request: FfiBookingRequest) -> FfiResult<FfiAppointment> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let request = BookingRequest {
            patient_id: request.patient_id,
            date: parse_date_arg(&request.date)?,
            start: parse_time_arg(&request.start)?,
            end: request.end.as_deref().map(parse_time_arg).transpose()?,
            appointment_type: parse_appointment_type(&request.appointment_type)?,
            reason: request.reason,
        };
        Ok(AppointmentBook::new(&db).book(&actor, request)?.into())
    }

    pub fn reschedule_appointment(
        &self,
        actor: String,
        appointment_id: String,
        changes: FfiAppointmentChanges,
    ) -> FfiResult<FfiAppointment> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let changes = AppointmentChanges {
            patient_id: changes.patient_id,
            date: changes.date.as_deref().map(parse_date_arg).transpose()?,
            start: changes.start.as_deref().map(parse_time_arg).transpose()?,
            end: changes.end.as_deref().map(parse_time_arg).transpose()?,
            appointment_type: changes
                .appointment_type
                .as_deref()
                .map(parse_appointment_type)
                .transpose()?,
            reason: changes.reason,
        };
        let appointment = AppointmentBook::new(&db).reschedule(&actor, &appointment_id, changes)?;
        Ok(appointment.into())
    }

    pub fn change_appointment_status(
        &self,
        actor: String,
        appointment_id: String,
        status: String,
    ) -> FfiResult<FfiAppointment> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let status = AppointmentStatus::parse(&status)
            .ok_or_else(|| ClinicCoreError::InvalidInput(format!("unknown status {}", status)))?;
        let appointment = AppointmentBook::new(&db).change_status(&actor, &appointment_id, status)?;
        Ok(appointment.into())
    }

    pub fn cancel_appointment(&self, actor: String, appointment_id: String) -> FfiResult<FfiAppointment> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        Ok(AppointmentBook::new(&db).cancel(&actor, &appointment_id)?.into())
    }

    pub fn add_appointment_note(
        &self,
        actor: String,
        appointment_id: String,
        body: String,
    ) -> FfiResult<FfiAppointmentNote> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let note = AppointmentBook::new(&db).add_note(&actor, &appointment_id, &body)?;
        Ok(note.into())
    }

    pub fn delete_appointment(&self, actor: String, appointment_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        AppointmentBook::new(&db).delete(&actor, &appointment_id)?;
        Ok(())
    }

    pub fn get_appointment(&self, actor: String, appointment_id: String) -> FfiResult<FfiAppointment> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageAppointments)?;
        Ok(AppointmentBook::new(&db).get(&appointment_id)?.into())
    }

    pub fn appointment_notes(
        &self,
        actor: String,
        appointment_id: String,
    ) -> FfiResult<Vec<FfiAppointmentNote>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageAppointments)?;
        let notes = AppointmentBook::new(&db).notes(&appointment_id)?;
        Ok(notes.into_iter().map(|n| n.into()).collect())
    }

    /// Appointments on a date (`YYYY-MM-DD`), by start time.
    pub fn agenda(&self, actor: String, date: String) -> FfiResult<Vec<FfiAppointment>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageAppointments)?;
        let appointments = AppointmentBook::new(&db).list_for_day(parse_date_arg(&date)?)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn agenda_today(&self, actor: String) -> FfiResult<Vec<FfiAppointment>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageAppointments)?;
        let appointments = AppointmentBook::new(&db).list_today()?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn patient_appointments(&self, actor: String, patient_id: String) -> FfiResult<Vec<FfiAppointment>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageAppointments)?;
        let appointments = AppointmentBook::new(&db).list_for_patient(&patient_id)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn search_appointments(&self, actor: String, query: String, limit: u32) -> FfiResult<Vec<FfiAppointment>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageAppointments)?;
        let appointments = AppointmentBook::new(&db).search(&query, limit as usize)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    // =========================================================================
    // Inventory Catalog
    // =========================================================================

    pub fn create_category(
        &self,
        actor: String,
        name: String,
        description: Option<String>,
    ) -> FfiResult<FfiCategory> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let category = Inventory::new(&db).create_category(&actor, &name, description)?;
        Ok(category.into())
    }

    pub fn list_categories(&self, actor: String) -> FfiResult<Vec<FfiCategory>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let categories = Inventory::new(&db).list_categories()?;
        Ok(categories.into_iter().map(|c| c.into()).collect())
    }

    pub fn update_category(&self, actor: String, category: FfiCategory) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let category = Category {
            id: category.id,
            name: category.name,
            description: category.description,
        };
        Inventory::new(&db).update_category(&actor, &category)?;
        Ok(())
    }

    pub fn delete_category(&self, actor: String, category_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        Inventory::new(&db).delete_category(&actor, &category_id)?;
        Ok(())
    }

    pub fn create_supplier(&self, actor: String, supplier: FfiSupplierInput) -> FfiResult<FfiSupplier> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let mut record = Supplier::new(supplier.name);
        record.contact = supplier.contact;
        record.phone = supplier.phone;
        record.email = supplier.email;
        record.address = supplier.address;
        Ok(Inventory::new(&db).create_supplier(&actor, record)?.into())
    }

    pub fn list_suppliers(&self, actor: String) -> FfiResult<Vec<FfiSupplier>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let suppliers = Inventory::new(&db).list_suppliers()?;
        Ok(suppliers.into_iter().map(|s| s.into()).collect())
    }

    pub fn get_supplier(&self, actor: String, supplier_id: String) -> FfiResult<FfiSupplier> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        Ok(Inventory::new(&db).get_supplier(&supplier_id)?.into())
    }

    pub fn update_supplier(&self, actor: String, supplier: FfiSupplier) -> FfiResult<FfiSupplier> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let supplier = Supplier {
            id: supplier.id,
            name: supplier.name,
            contact: supplier.contact,
            phone: supplier.phone,
            email: supplier.email,
            address: supplier.address,
        };
        Ok(Inventory::new(&db).update_supplier(&actor, supplier)?.into())
    }

    pub fn delete_supplier(&self, actor: String, supplier_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        Inventory::new(&db).delete_supplier(&actor, &supplier_id)?;
        Ok(())
    }

    /// Create a medicine; a `MED-NNNN` code is generated when none is given.
    pub fn create_medicine(&self, actor: String, medicine: FfiNewMedicine) -> FfiResult<FfiMedicine> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let new = NewMedicine {
            name: medicine.name,
            description: medicine.description,
            category_id: medicine.category_id,
            supplier_id: medicine.supplier_id,
            unit_price_cents: medicine.unit_price_cents,
            minimum_stock: medicine.minimum_stock,
            code: medicine.code,
        };
        Ok(Inventory::new(&db).create_medicine(&actor, new)?.into())
    }

    pub fn update_medicine(
        &self,
        actor: String,
        medicine_id: String,
        changes: FfiMedicineChanges,
    ) -> FfiResult<FfiMedicine> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let changes = MedicineChanges {
            name: changes.name,
            description: changes.description.map(Some),
            category_id: changes.category_id,
            supplier_id: changes.supplier_id,
            unit_price_cents: changes.unit_price_cents,
            minimum_stock: changes.minimum_stock,
        };
        Ok(Inventory::new(&db)
            .update_medicine(&actor, &medicine_id, changes)?
            .into())
    }

    pub fn get_medicine_by_code(&self, actor: String, code: String) -> FfiResult<Option<FfiMedicine>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let medicine = db.get_medicine_by_code(&code)?;
        Ok(medicine.map(|m| m.into()))
    }

    pub fn list_medicines(&self, actor: String) -> FfiResult<Vec<FfiMedicine>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let medicines = Inventory::new(&db).list_medicines()?;
        Ok(medicines.into_iter().map(|m| m.into()).collect())
    }

    pub fn search_medicines(&self, actor: String, query: String, limit: u32) -> FfiResult<Vec<FfiMedicine>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let medicines = Inventory::new(&db).search_medicines(&query, limit as usize)?;
        Ok(medicines.into_iter().map(|m| m.into()).collect())
    }

    pub fn delete_medicine(&self, actor: String, medicine_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        Inventory::new(&db).delete_medicine(&actor, &medicine_id)?;
        Ok(())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    pub fn record_entry(
        &self,
        actor: String,
        medicine_id: String,
        quantity: i64,
        description: Option<String>,
    ) -> FfiResult<FfiMovement> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let movement = Inventory::new(&db).record_entry(&actor, &medicine_id, quantity, description)?;
        Ok(movement.into())
    }

    /// Dispense stock. Fails with `InsufficientStock` when the quantity
    /// exceeds the ledger-derived stock.
    pub fn record_exit(
        &self,
        actor: String,
        medicine_id: String,
        quantity: i64,
        description: Option<String>,
    ) -> FfiResult<FfiMovement> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let movement = Inventory::new(&db).record_exit(&actor, &medicine_id, quantity, description)?;
        Ok(movement.into())
    }

    pub fn movements(&self, actor: String, medicine_id: String) -> FfiResult<Vec<FfiMovement>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let movements = Inventory::new(&db).movements(&medicine_id)?;
        Ok(movements.into_iter().map(|m| m.into()).collect())
    }

    /// Latest movements across all medicines, newest first.
    pub fn recent_movements(&self, actor: String, limit: u32) -> FfiResult<Vec<FfiMovement>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let movements = Inventory::new(&db).recent_movements(limit as usize)?;
        Ok(movements.into_iter().map(|m| m.into()).collect())
    }

    pub fn stock_level(&self, actor: String, medicine_id: String) -> FfiResult<FfiStockLevel> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        Ok(Inventory::new(&db).stock_level(&medicine_id)?.into())
    }

    pub fn stock_overview(&self, actor: String) -> FfiResult<Vec<FfiStockLevel>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let levels = Inventory::new(&db).stock_overview()?;
        Ok(levels.into_iter().map(|l| l.into()).collect())
    }

    pub fn add_lot(&self, actor: String, lot: FfiLotInput) -> FfiResult<FfiLot> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let inventory = Inventory::new(&db);
        let saved = inventory.add_lot(
            &actor,
            &lot.medicine_id,
            lot.quantity,
            parse_date_arg(&lot.expiration_date)?,
            lot.lot_number,
        )?;
        let view = inventory
            .list_lots(Some(&saved.medicine_id))?
            .into_iter()
            .find(|v| v.lot.id == saved.id)
            .ok_or_else(|| ClinicCoreError::NotFound(format!("lot {}", saved.id)))?;
        Ok(view.into())
    }

    /// Correct a lot's quantity, expiry or batch number.
    pub fn update_lot(&self, actor: String, lot_id: String, lot: FfiLotInput) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let mut stored = db
            .get_lot(&lot_id)?
            .ok_or_else(|| ClinicCoreError::NotFound(format!("lot {}", lot_id)))?;
        stored.medicine_id = lot.medicine_id;
        stored.quantity = lot.quantity;
        stored.expiration_date = parse_date_arg(&lot.expiration_date)?;
        stored.lot_number = lot.lot_number;
        stored.updated_at = chrono::Utc::now().to_rfc3339();
        Inventory::new(&db).update_lot(&actor, &stored)?;
        Ok(())
    }

    pub fn list_lots(&self, actor: String, medicine_id: Option<String>) -> FfiResult<Vec<FfiLot>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let lots = Inventory::new(&db).list_lots(medicine_id.as_deref())?;
        Ok(lots.into_iter().map(|l| l.into()).collect())
    }

    pub fn lots_expiring_within(&self, actor: String, days: u32) -> FfiResult<Vec<FfiLot>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ViewInventory)?;
        let lots = Inventory::new(&db).lots_expiring_within(days)?;
        Ok(lots.into_iter().map(|l| l.into()).collect())
    }

    pub fn delete_lot(&self, actor: String, lot_id: String) -> FfiResult<()> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        Inventory::new(&db).delete_lot(&actor, &lot_id)?;
        Ok(())
    }

    /// Recompute the movement ledger's hash chains.
    pub fn verify_ledger(&self, actor: String) -> FfiResult<FfiLedgerReport> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        authorize(&actor, Permission::ManageInventory)?;
        Ok(Inventory::new(&db).verify_ledger()?.into())
    }

    /// Assign codes to medicines stored without one.
    pub fn backfill_medicine_codes(&self, actor: String) -> FfiResult<Vec<FfiMedicine>> {
        let db = self.db.lock()?;
        let actor = resolve_actor(&db, &actor)?;
        let updated = Inventory::new(&db).backfill_missing_codes(&actor)?;
        Ok(updated.into_iter().map(|m| m.into()).collect())
    }

    // =========================================================================
    // Dashboard & Export
    // =========================================================================

    pub fn dashboard(&self, actor: String) -> FfiResult<FfiDashboard> {
        let db = self.db.lock()?;
        resolve_actor(&db, &actor)?;
        let today = chrono::Local::now().date_naive();
        Ok(dashboard::summarize(&db, today)?.into())
    }

    pub fn export_stock_json(&self, actor: String) -> FfiResult<String> {
        let db = self.db.lock()?;
        let report = stock_report(&db, &actor)?;
        Ok(report.to_json()?)
    }

    pub fn export_stock_csv(&self, actor: String) -> FfiResult<String> {
        let db = self.db.lock()?;
        let report = stock_report(&db, &actor)?;
        Ok(report.to_csv())
    }

    pub fn export_agenda_json(&self, actor: String, date: String) -> FfiResult<String> {
        let db = self.db.lock()?;
        let agenda = agenda_export(&db, &actor, &date)?;
        Ok(agenda.to_json()?)
    }

    pub fn export_agenda_csv(&self, actor: String, date: String) -> FfiResult<String> {
        let db = self.db.lock()?;
        let agenda = agenda_export(&db, &actor, &date)?;
        Ok(agenda.to_csv())
    }
}

// =========================================================================
// Argument Helpers
// =========================================================================

fn resolve_actor(db: &Database, username: &str) -> FfiResult<UserProfile> {
    Ok(StaffDirectory::new(db).resolve(username)?)
}

fn stock_report(db: &Database, actor: &str) -> FfiResult<export::StockReport> {
    let actor = resolve_actor(db, actor)?;
    authorize(&actor, Permission::ViewInventory)?;
    Ok(export::StockReport::build(db, chrono::Local::now().date_naive())?)
}

fn agenda_export(db: &Database, actor: &str, date: &str) -> FfiResult<export::AgendaExport> {
    let actor = resolve_actor(db, actor)?;
    authorize(&actor, Permission::ManageAppointments)?;
    Ok(export::AgendaExport::build(db, parse_date_arg(date)?)?)
}

fn parse_date_arg(s: &str) -> FfiResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), db::DATE_FORMAT)
        .map_err(|_| ClinicCoreError::InvalidInput(format!("invalid date {:?}, expected YYYY-MM-DD", s)))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
fn parse_time_arg(s: &str) -> FfiResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, db::TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ClinicCoreError::InvalidInput(format!("invalid time {:?}, expected HH:MM", s)))
}

fn parse_role(s: &str) -> FfiResult<Role> {
    Role::parse(s).ok_or_else(|| ClinicCoreError::InvalidInput(format!("unknown role {}", s)))
}

fn parse_appointment_type(s: &str) -> FfiResult<AppointmentType> {
    AppointmentType::parse(s)
        .ok_or_else(|| ClinicCoreError::InvalidInput(format!("unknown appointment type {}", s)))
}

fn parse_permission(s: &str) -> FfiResult<Permission> {
    let permission = match s.trim() {
        "manage_patients" => Permission::ManagePatients,
        "manage_appointments" => Permission::ManageAppointments,
        "view_inventory" => Permission::ViewInventory,
        "view_medical_history" => Permission::ViewMedicalHistory,
        "edit_medical_history" => Permission::EditMedicalHistory,
        "dispense_medicine" => Permission::DispenseMedicine,
        "manage_inventory" => Permission::ManageInventory,
        "manage_users" => Permission::ManageUsers,
        other => {
            return Err(ClinicCoreError::InvalidInput(format!("unknown permission {}", other)))
        }
    };
    Ok(permission)
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe staff profile.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub username: String,
    pub role: String,
}

impl From<UserProfile> for FfiUser {
    fn from(user: UserProfile) -> Self {
        Self {
            username: user.username,
            role: user.role.as_str().to_string(),
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub document_number: String,
    pub birth_date: Option<String>,
    pub age: Option<u32>,
    pub gender: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        let age = patient.age_on(chrono::Local::now().date_naive());
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            document_number: patient.document_number,
            birth_date: patient.birth_date.map(|d| d.format(db::DATE_FORMAT).to_string()),
            age,
            gender: patient.gender.as_str().to_string(),
            phone: patient.phone,
            address: patient.address,
            email: patient.email,
        }
    }
}

/// Submitted patient fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientInput {
    pub first_name: String,
    pub last_name: String,
    pub document_number: String,
    pub birth_date: Option<String>,
    pub gender: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
}

impl FfiPatientInput {
    /// Apply the input onto an existing record, or a new one.
    fn into_patient(self, existing: Option<Patient>) -> FfiResult<Patient> {
        let mut patient = match existing {
            Some(mut patient) => {
                patient.first_name = self.first_name;
                patient.last_name = self.last_name;
                patient.document_number = self.document_number;
                patient
            }
            None => Patient::new(self.first_name, self.last_name, self.document_number),
        };
        patient.birth_date = self.birth_date.as_deref().map(parse_date_arg).transpose()?;
        patient.gender = Gender::parse(&self.gender)
            .ok_or_else(|| ClinicCoreError::InvalidInput(format!("unknown gender {}", self.gender)))?;
        patient.phone = self.phone;
        patient.address = self.address;
        patient.email = self.email;
        Ok(patient)
    }
}

/// FFI-safe medical history.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicalHistory {
    pub patient_id: String,
    pub allergies: Option<String>,
    pub pre_existing_conditions: Option<String>,
    pub current_medications: Option<String>,
}

impl From<MedicalHistory> for FfiMedicalHistory {
    fn from(history: MedicalHistory) -> Self {
        Self {
            patient_id: history.patient_id,
            allergies: history.allergies,
            pre_existing_conditions: history.pre_existing_conditions,
            current_medications: history.current_medications,
        }
    }
}

/// FFI-safe appointment. Dates are `YYYY-MM-DD`, times `HH:MM`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: String,
    pub date: String,
    pub start: String,
    pub end: String,
    pub status: String,
    pub appointment_type: String,
    pub reason: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            date: appointment.date.format(db::DATE_FORMAT).to_string(),
            start: appointment.start.format(db::TIME_FORMAT).to_string(),
            end: appointment.end.format(db::TIME_FORMAT).to_string(),
            status: appointment.status.as_str().to_string(),
            appointment_type: appointment.appointment_type.as_str().to_string(),
            reason: appointment.reason,
        }
    }
}

/// Booking form fields. `end` defaults from the appointment type.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBookingRequest {
    pub patient_id: String,
    pub date: String,
    pub start: String,
    pub end: Option<String>,
    pub appointment_type: String,
    pub reason: String,
}

/// Edit form fields; `None` keeps the stored value.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentChanges {
    pub patient_id: Option<String>,
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub appointment_type: Option<String>,
    pub reason: Option<String>,
}

/// FFI-safe appointment note.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentNote {
    pub id: String,
    pub appointment_id: String,
    pub kind: String,
    pub body: String,
    pub author: String,
    pub created_at: String,
}

impl From<AppointmentNote> for FfiAppointmentNote {
    fn from(note: AppointmentNote) -> Self {
        Self {
            id: note.id,
            appointment_id: note.appointment_id,
            kind: note.kind.as_str().to_string(),
            body: note.body,
            author: note.author,
            created_at: note.created_at,
        }
    }
}

/// FFI-safe category.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCategory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<Category> for FfiCategory {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
        }
    }
}

/// FFI-safe supplier.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSupplier {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl From<Supplier> for FfiSupplier {
    fn from(supplier: Supplier) -> Self {
        Self {
            id: supplier.id,
            name: supplier.name,
            contact: supplier.contact,
            phone: supplier.phone,
            email: supplier.email,
            address: supplier.address,
        }
    }
}

/// Submitted supplier fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSupplierInput {
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// FFI-safe medicine.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    pub id: String,
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub supplier_id: String,
    pub unit_price_cents: i64,
    pub unit_price: String,
    pub minimum_stock: i64,
}

impl From<Medicine> for FfiMedicine {
    fn from(medicine: Medicine) -> Self {
        let unit_price = medicine.unit_price_display();
        Self {
            id: medicine.id,
            code: medicine.code,
            name: medicine.name,
            description: medicine.description,
            category_id: medicine.category_id,
            supplier_id: medicine.supplier_id,
            unit_price_cents: medicine.unit_price_cents,
            unit_price,
            minimum_stock: medicine.minimum_stock,
        }
    }
}

/// Submitted medicine fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewMedicine {
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub supplier_id: String,
    pub unit_price_cents: i64,
    pub minimum_stock: i64,
    pub code: Option<String>,
}

/// Editable medicine fields; `None` keeps the stored value.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub minimum_stock: Option<i64>,
}

/// FFI-safe ledger movement.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMovement {
    pub id: String,
    pub medicine_id: String,
    pub kind: String,
    pub quantity: i64,
    pub recorded_at: String,
    pub actor: String,
    pub description: Option<String>,
}

impl From<InventoryMovement> for FfiMovement {
    fn from(movement: InventoryMovement) -> Self {
        Self {
            id: movement.id,
            medicine_id: movement.medicine_id,
            kind: movement.kind.as_str().to_string(),
            quantity: movement.quantity,
            recorded_at: movement.recorded_at,
            actor: movement.actor,
            description: movement.description,
        }
    }
}

/// FFI-safe stock level.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockLevel {
    pub medicine_id: String,
    pub code: Option<String>,
    pub name: String,
    pub current: i64,
    pub minimum: i64,
    /// `agotado`, `bajo` or `normal`
    pub status: String,
}

impl From<StockLevel> for FfiStockLevel {
    fn from(level: StockLevel) -> Self {
        Self {
            medicine_id: level.medicine_id,
            code: level.code,
            name: level.name,
            current: level.current,
            minimum: level.minimum,
            status: level.status.as_str().to_string(),
        }
    }
}

/// Submitted lot fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLotInput {
    pub medicine_id: String,
    pub quantity: i64,
    pub expiration_date: String,
    pub lot_number: Option<String>,
}

/// FFI-safe lot with its status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLot {
    pub id: String,
    pub medicine_id: String,
    pub medicine_name: String,
    pub quantity: i64,
    pub expiration_date: String,
    pub lot_number: Option<String>,
    /// `caducado`, `agotado`, `bajo_stock` or `disponible`
    pub status: String,
    pub days_until_expiry: i64,
}

impl From<LotView> for FfiLot {
    fn from(view: LotView) -> Self {
        Self {
            id: view.lot.id,
            medicine_id: view.lot.medicine_id,
            medicine_name: view.medicine_name,
            quantity: view.lot.quantity,
            expiration_date: view.lot.expiration_date.format(db::DATE_FORMAT).to_string(),
            lot_number: view.lot.lot_number,
            status: view.status.as_str().to_string(),
            days_until_expiry: view.days_until_expiry,
        }
    }
}

/// FFI-safe ledger verification result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLedgerReport {
    pub chains_checked: u32,
    pub rows_checked: u32,
    pub intact: bool,
    pub broken_medicine_ids: Vec<String>,
}

impl From<LedgerReport> for FfiLedgerReport {
    fn from(report: LedgerReport) -> Self {
        Self {
            chains_checked: report.chains_checked as u32,
            rows_checked: report.rows_checked as u32,
            intact: report.is_intact(),
            broken_medicine_ids: report.breaks.into_iter().map(|b| b.medicine_id).collect(),
        }
    }
}

/// FFI-safe dashboard totals.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboard {
    pub patients: i64,
    pub appointments_today: i64,
    pub scheduled_appointments: i64,
    pub medical_histories: i64,
    pub low_stock_medicines: i64,
    pub depleted_medicines: i64,
}

impl From<dashboard::DashboardSummary> for FfiDashboard {
    fn from(summary: dashboard::DashboardSummary) -> Self {
        Self {
            patients: summary.patients,
            appointments_today: summary.appointments_today,
            scheduled_appointments: summary.scheduled_appointments,
            medical_histories: summary.medical_histories,
            low_stock_medicines: summary.low_stock_medicines,
            depleted_medicines: summary.depleted_medicines,
        }
    }
}
