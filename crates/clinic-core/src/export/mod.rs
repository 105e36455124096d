//! Report exports (JSON and CSV).

mod agenda;
mod stock;

pub use agenda::*;
pub use stock::*;

/// Quote a CSV field when it contains a separator, quote or line break.
pub(crate) fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
