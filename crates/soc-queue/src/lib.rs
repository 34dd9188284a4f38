//! # soc-queue
//!
//! Tenant-scoped priority job queue and worker pool for the
//! platform's background jobs: detection runs, retention export, and
//! embedding migration.
//!
//! Features:
//! - Generic `Job` trait, implemented per job kind by the crate that
//!   owns that domain logic
//! - Pluggable backend (in-memory now, durable later)
//! - Worker pool with bounded concurrency
//! - Retry with exponential backoff, dead-lettering after max retries

pub mod backend;
pub mod job;
pub mod kinds;
pub mod memory;
pub mod worker;

pub use backend::{QueueBackend, QueueError};
pub use job::{BackoffStrategy, Job, JobEntry, JobId, JobResult, JobStatus};
pub use memory::MemoryQueue;
pub use worker::{WorkerConfig, WorkerPool};
