//! # soc-runtime
//!
//! The detection runner: the scheduling loop that binds routing,
//! resilient model dispatch, audit logging, and autonomy gating into
//! the job types the worker pool dispatches.

pub mod config;
pub mod error;
pub mod jobs;
pub mod runner;

pub use config::{ConcurrencyConfig, DriftConfig, RetentionConfig};
pub use error::RunnerError;
pub use jobs::{DetectionRunJob, EmbeddingMigrationJob, RetentionExportJob, RetentionExportPayload};
pub use runner::{DetectionOutcome, DetectionRunPayload, DetectionRunner};
