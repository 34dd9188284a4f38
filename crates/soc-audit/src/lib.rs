//! # soc-audit
//!
//! Tamper-evident per-tenant audit chains: the writer that links and
//! persists records, a four-tier verification scheduler, a
//! content-addressed evidence blob store, evidence package assembly,
//! and the warm-to-cold retention lifecycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use soc_audit::{ChainWriter, FileChainBackend};
//! use soc_core::AuditRecord;
//!
//! #[tokio::main]
//! async fn main() {
//!     let writer = ChainWriter::new(FileChainBackend::new("./audit"));
//!     let draft = AuditRecord::genesis("tenant-a");
//!     let record = writer.append("tenant-a", draft).await.unwrap();
//!     println!("wrote sequence {}", record.sequence_number);
//! }
//! ```

mod backend;
mod chain;
mod error;
mod evidence;
mod package;
mod retention;
mod verification;

#[cfg(feature = "file")]
mod file;

pub use backend::ChainBackend;
pub use chain::ChainWriter;
pub use error::AuditError;
pub use evidence::{EvidenceBackend, EvidenceStore, InMemoryEvidenceBackend};
pub use package::{EvidencePackage, EvidencePackageBuilder, NoEvidenceBackend};
pub use retention::{
    ColdStorageBackend, LegalHoldRegistry, PartitionId, RetentionLifecycle, BUFFER_MONTHS,
    EXPORT_LAG_MONTHS, WARM_RETENTION_MONTHS,
};
pub use verification::{
    ColdHashSidecar, QueueOffsetSource, VerificationResult, VerificationScheduler,
    VerificationType, COLD_SAMPLE_SIZE, CONTINUOUS_RECORD_WINDOW, LAG_ALERT_THRESHOLD,
};

#[cfg(feature = "file")]
pub use file::FileChainBackend;
