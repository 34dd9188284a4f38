//! Error types for audit chain writing, verification, and evidence storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("chain not found for tenant {0}")]
    ChainNotFound(String),

    #[error("concurrent write detected for tenant {tenant_id}: expected sequence {expected}, got {actual}")]
    SequenceConflict {
        tenant_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("chain integrity violation for tenant {tenant_id}: {violations:?}")]
    IntegrityViolation {
        tenant_id: String,
        violations: Vec<String>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("legal hold blocks retention action on tenant {0}")]
    LegalHold(String),

    #[error("export not yet verified for partition {0}")]
    ExportUnverified(String),
}
