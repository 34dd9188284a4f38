//! Warm-tier chain storage: a [`soc_audit::ChainBackend`] implementation
//! over the generic [`StorageBackend`] KV layer, for the SQLite tier a
//! tenant's chain moves into once it ages out of the hot durable queue.

use std::sync::Arc;

use async_trait::async_trait;
use soc_audit::{AuditError, ChainBackend};
use soc_core::AuditRecord;

use crate::backend::{StorageBackend, StorageError, StorageExt};

impl From<StorageError> for AuditError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AuditError::ChainNotFound(msg),
            other => AuditError::BackendUnavailable(other.to_string()),
        }
    }
}

/// Durable chain store for a tenant's warm-tier records, layered over
/// any [`StorageBackend`] (in-memory for tests, SQLite in production).
#[derive(Debug)]
pub struct AuditRecordStore<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: StorageBackend + ?Sized> AuditRecordStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn record_key(&self, tenant_id: &str, sequence_number: u64) -> String {
        format!("audit:record:{tenant_id}:{sequence_number:020}")
    }

    fn max_sequence_key(&self, tenant_id: &str) -> String {
        format!("audit:max_seq:{tenant_id}")
    }

    /// Highest sequence number persisted for a tenant, used by the
    /// hourly lag check to compare against the durable queue's last
    /// acked offset.
    pub async fn max_sequence(&self, tenant_id: &str) -> Result<Option<u64>, StorageError> {
        self.backend.get(&self.max_sequence_key(tenant_id)).await
    }

    /// Serializes a tenant's records in `[start, end)` as newline-delimited
    /// JSON, the raw bytes a monthly export hands to cold storage.
    pub async fn export_partition(&self, tenant_id: &str, start: u64, end: u64) -> Result<Vec<u8>, StorageError> {
        let mut buf = Vec::new();
        for sequence_number in start..end {
            if let Some(record) = self.backend.get::<AuditRecord>(&self.record_key(tenant_id, sequence_number)).await? {
                serde_json::to_writer(&mut buf, &record).map_err(|e| StorageError::Serialization(e.to_string()))?;
                buf.push(b'\n');
            }
        }
        Ok(buf)
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized> ChainBackend for AuditRecordStore<B> {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.backend
            .set(&self.record_key(&record.tenant_id, record.sequence_number), record)
            .await?;

        let current_max: Option<u64> = self.backend.get(&self.max_sequence_key(&record.tenant_id)).await?;
        if current_max.is_none_or(|max| record.sequence_number > max) {
            self.backend
                .set(&self.max_sequence_key(&record.tenant_id), &record.sequence_number)
                .await?;
        }

        Ok(())
    }

    async fn read_tail(&self, tenant_id: &str, limit: usize) -> Result<Vec<AuditRecord>, AuditError> {
        let all = self.read_all(tenant_id).await?;
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn read_all(&self, tenant_id: &str) -> Result<Vec<AuditRecord>, AuditError> {
        let max_sequence = self.max_sequence(tenant_id).await?;
        let Some(max_sequence) = max_sequence else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for sequence_number in 0..=max_sequence {
            if let Some(record) = self
                .backend
                .get::<AuditRecord>(&self.record_key(tenant_id, sequence_number))
                .await?
            {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn name(&self) -> &str {
        "warm-sqlite"
    }

    async fn is_healthy(&self) -> bool {
        self.backend.is_healthy().await
    }
}
