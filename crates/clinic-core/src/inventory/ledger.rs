//! Hash-chained movement ledger.
//!
//! Each medicine has its own chain. A row stores
//! `entry_hash = sha256(prev_hash || canonical_json(movement))`, where
//! `prev_hash` is the previous row's hash for the same medicine (empty
//! for the first row). Any edit to a stored row breaks the chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{Database, DbResult, LedgerRow};

/// Hash data with SHA-256, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Chain hash for a movement appended after `prev_hash`.
pub fn hash_entry(prev_hash: Option<&str>, canonical_json: &str) -> String {
    let combined = format!("{}{}", prev_hash.unwrap_or(""), canonical_json);
    hash_data(combined.as_bytes())
}

/// First broken link found in a medicine's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBreak {
    pub medicine_id: String,
    pub movement_id: String,
    pub seq: i64,
    pub reason: String,
}

/// Result of verifying every chain in the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub chains_checked: usize,
    pub rows_checked: usize,
    pub breaks: Vec<LedgerBreak>,
}

impl LedgerReport {
    pub fn is_intact(&self) -> bool {
        self.breaks.is_empty()
    }
}

/// Check one medicine's rows (in append order).
pub fn verify_chain(medicine_id: &str, rows: &[LedgerRow]) -> DbResult<Option<LedgerBreak>> {
    let mut prev: Option<&str> = None;
    for row in rows {
        if row.prev_hash.as_deref() != prev {
            return Ok(Some(LedgerBreak {
                medicine_id: medicine_id.to_string(),
                movement_id: row.movement.id.clone(),
                seq: row.seq,
                reason: "previous hash does not match the preceding row".into(),
            }));
        }

        let json = row.movement.to_canonical_json()?;
        if hash_entry(prev, &json) != row.entry_hash {
            return Ok(Some(LedgerBreak {
                medicine_id: medicine_id.to_string(),
                movement_id: row.movement.id.clone(),
                seq: row.seq,
                reason: "movement content does not match its hash".into(),
            }));
        }
        prev = Some(&row.entry_hash);
    }
    Ok(None)
}

/// Recompute every chain in the database.
pub fn verify_ledger(db: &Database) -> DbResult<LedgerReport> {
    let mut report = LedgerReport::default();
    for medicine_id in db.list_ledger_medicine_ids()? {
        let rows = db.list_ledger_for_medicine(&medicine_id)?;
        report.chains_checked += 1;
        report.rows_checked += rows.len();
        if let Some(broken) = verify_chain(&medicine_id, &rows)? {
            tracing::warn!(
                medicine_id = %broken.medicine_id,
                seq = broken.seq,
                reason = %broken.reason,
                "ledger chain broken"
            );
            report.breaks.push(broken);
        }
    }
    Ok(report)
}
