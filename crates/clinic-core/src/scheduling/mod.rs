//! Appointment scheduling: the conflict validator and the transactional
//! appointment book built on top of it.

mod book;
mod validator;

pub use book::*;
pub use validator::*;
