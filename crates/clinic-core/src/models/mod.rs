//! Domain models for the clinic.

mod appointment;
mod inventory;
mod patient;
mod user;

pub use appointment::*;
pub use inventory::*;
pub use patient::*;
pub use user::*;
