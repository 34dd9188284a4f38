//! Append-only backend trait for persisting chained audit records.

use async_trait::async_trait;
use soc_core::AuditRecord;

use crate::error::AuditError;

/// An append-only store for one tenant's hash chain.
///
/// Implementations must never allow updates or deletions of previously
/// written records; the only supported operations are append and read.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Append a record that has already been hashed and linked.
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// Read the most recent `limit` records for a tenant, in ascending
    /// sequence order.
    async fn read_tail(&self, tenant_id: &str, limit: usize) -> Result<Vec<AuditRecord>, AuditError>;

    /// Read every record for a tenant, in ascending sequence order.
    async fn read_all(&self, tenant_id: &str) -> Result<Vec<AuditRecord>, AuditError>;

    /// Human-readable backend name, used in log lines and error messages.
    fn name(&self) -> &str;

    async fn is_healthy(&self) -> bool;
}
