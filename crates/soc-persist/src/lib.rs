//! # soc-persist
//!
//! Durable storage for the platform's three persistence surfaces:
//! the warm audit-record tier behind the durable queue, context
//! snapshots captured for each investigation, and vector embeddings
//! with their checkpointed model migrations.
//!
//! Every store layers on the generic [`StorageBackend`] trait, so the
//! same store type runs against [`backend::MemoryBackend`] in tests
//! and [`sqlite::SqliteBackend`] in production.

pub mod audit_store;
pub mod backend;
pub mod context_store;
pub mod migration;
pub mod queue;
pub mod sqlite;
pub mod vector_store;

pub use audit_store::AuditRecordStore;
pub use backend::{MemoryBackend, StorageBackend, StorageError, StorageExt};
pub use context_store::{ContextSnapshot, ContextStore};
pub use migration::{EmbedFn, EmbeddingMigrationJob, MigrationError, MigrationProgress, MigrationStatus, OldModelSource};
pub use queue::SqliteQueueBackend;
pub use sqlite::{SqliteBackend, SqliteConfig};
pub use vector_store::{
    MemoryVectorStore, SqliteVectorStore, VectorEmbedding, VectorError, VectorStoreBackend,
};
