//! Medicine inventory: code assignment, ledger-derived stock and the
//! transactional inventory service.

mod codes;
mod ledger;
mod stock;
mod store;

pub use codes::*;
pub use ledger::*;
pub use stock::*;
pub use store::*;
