//! Hash chain primitives: canonical hashing, genesis, linking, and
//! full-chain verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::AuditRecord;

/// Compute the SHA-256 hex digest of a record's canonical JSON
/// serialization, excluding `record_hash` itself.
pub fn compute_record_hash(record: &AuditRecord) -> String {
    let mut value = serde_json::to_value(record).expect("AuditRecord always serializes");
    if let serde_json::Value::Object(map) = &mut value {
        map.remove("record_hash");
    }
    let canonical = serde_jcs::to_vec(&value).unwrap_or_else(|_| {
        // Extremely defensive fallback: serde_jcs only fails on NaN/Infinity
        // floats, which AuditRecord never contains.
        serde_json::to_vec(&value).unwrap_or_default()
    });
    let digest = Sha256::digest(&canonical);
    hex::encode(digest)
}

/// Current chain head for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub tenant_id: String,
    pub last_sequence: u64,
    pub last_hash: String,
    pub last_timestamp: DateTime<Utc>,
}

impl ChainState {
    pub fn from_genesis(genesis: &AuditRecord) -> Self {
        Self {
            tenant_id: genesis.tenant_id.clone(),
            last_sequence: genesis.sequence_number,
            last_hash: genesis.record_hash.clone(),
            last_timestamp: genesis.timestamp,
        }
    }

    pub fn advance(&mut self, record: &AuditRecord) {
        self.last_sequence = record.sequence_number;
        self.last_hash = record.record_hash.clone();
        self.last_timestamp = record.timestamp;
    }
}

/// Link an incoming, not-yet-hashed record into the chain: assigns the
/// next sequence number, stamps `previous_hash` from the chain head,
/// and computes `record_hash`.
pub fn chain_event(mut record: AuditRecord, chain_state: &ChainState) -> AuditRecord {
    record.sequence_number = chain_state.last_sequence + 1;
    record.previous_hash = chain_state.last_hash.clone();
    record.ingested_at = Utc::now();
    record.record_hash = compute_record_hash(&record);
    record
}

/// Verify a set of records forms a valid hash chain.
///
/// Records are sorted by `sequence_number` first. Every violation found
/// is collected rather than stopping at the first one, so callers get a
/// complete picture of the damage.
pub fn verify_chain(records: &[AuditRecord]) -> (bool, Vec<String>) {
    let mut errors = Vec::new();
    if records.is_empty() {
        return (true, errors);
    }

    let mut sorted: Vec<&AuditRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.sequence_number);

    for (i, record) in sorted.iter().enumerate() {
        let expected_hash = compute_record_hash(record);
        if record.record_hash != expected_hash {
            errors.push(format!(
                "record seq={}: hash mismatch (expected {}..., got {}...)",
                record.sequence_number,
                &expected_hash[..16.min(expected_hash.len())],
                &record.record_hash[..16.min(record.record_hash.len())],
            ));
        }

        if i > 0 {
            let prev = sorted[i - 1];
            if record.previous_hash != prev.record_hash {
                errors.push(format!(
                    "record seq={}: previous_hash does not link to seq={} record_hash",
                    record.sequence_number, prev.sequence_number,
                ));
            }
            let expected_seq = prev.sequence_number + 1;
            if record.sequence_number != expected_seq {
                errors.push(format!(
                    "sequence gap: expected {}, got {}",
                    expected_seq, record.sequence_number,
                ));
            }
        }
    }

    (errors.is_empty(), errors)
}
