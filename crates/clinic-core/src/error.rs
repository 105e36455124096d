//! Crate-level error type for the clinic write paths.

use thiserror::Error;

use crate::db::DbError;
use crate::inventory::StockError;
use crate::scheduling::ScheduleError;

/// Errors returned by the registry, appointment book and inventory services.
///
/// Validation variants are recoverable: the surrounding transaction has
/// been rolled back and the message can be shown to the user as-is.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Document number {0} is already registered to another patient")]
    DuplicateDocument(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User {username} is not allowed to {action}")]
    PermissionDenied { username: String, action: String },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl ClinicError {
    /// Whether this is a validation failure rather than an unexpected fault.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ClinicError::Database(_))
    }
}

impl From<rusqlite::Error> for ClinicError {
    fn from(e: rusqlite::Error) -> Self {
        ClinicError::Database(DbError::Sqlite(e))
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
