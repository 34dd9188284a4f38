//! Shared error types used across the platform's crates.

use thiserror::Error;

/// Errors arising from hash-chain construction and verification.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain for tenant {tenant_id} is empty")]
    EmptyChain { tenant_id: String },

    #[error("chain integrity violation for tenant {tenant_id}: {violations:?}")]
    IntegrityViolation {
        tenant_id: String,
        violations: Vec<String>,
    },

    #[error("concurrent write detected for tenant {tenant_id}: expected sequence {expected}, got {actual}")]
    SequenceConflict {
        tenant_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("canonical serialization failed: {0}")]
    Serialization(String),
}
