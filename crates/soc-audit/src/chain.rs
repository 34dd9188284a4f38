//! Per-tenant chain writer enforcing the single-writer invariant.

use std::collections::HashMap;
use std::sync::Arc;

use soc_core::{chain_event, AuditRecord, ChainState};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::ChainBackend;
use crate::error::AuditError;

/// Coordinates writes to tenant hash chains.
///
/// Holds one `tokio::sync::Mutex` per tenant so that two concurrent
/// writers for the same tenant serialize on chain-head access — the
/// chain's single-writer-per-tenant invariant — while writers for
/// different tenants proceed fully in parallel.
pub struct ChainWriter<B: ChainBackend> {
    backend: Arc<B>,
    locks: Mutex<HashMap<String, Arc<Mutex<ChainState>>>>,
}

impl<B: ChainBackend> ChainWriter<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<ChainState>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ChainState {
                tenant_id: tenant_id.to_string(),
                last_sequence: 0,
                last_hash: String::new(),
                last_timestamp: chrono::Utc::now(),
            })))
            .clone()
    }

    /// Append a not-yet-chained record, initializing the tenant's
    /// genesis record on first write.
    pub async fn append(&self, tenant_id: &str, draft: AuditRecord) -> Result<AuditRecord, AuditError> {
        let lock = self.tenant_lock(tenant_id).await;
        let mut state = lock.lock().await;

        if state.last_hash.is_empty() {
            let genesis = AuditRecord::genesis(tenant_id);
            self.backend.append(&genesis).await?;
            *state = ChainState::from_genesis(&genesis);
            info!(tenant_id, "initialized new audit chain");
        }

        let record = chain_event(draft, &state);
        self.backend.append(&record).await?;
        state.advance(&record);
        Ok(record)
    }

    /// Rehydrate in-memory chain head state from persisted history.
    /// Call this on startup before accepting writes for a tenant that
    /// already has records, since `ChainWriter` otherwise assumes an
    /// empty chain the first time a tenant is seen.
    pub async fn hydrate(&self, tenant_id: &str) -> Result<(), AuditError> {
        let records = self.backend.read_all(tenant_id).await?;
        if let Some(last) = records.last() {
            let lock = self.tenant_lock(tenant_id).await;
            let mut state = lock.lock().await;
            *state = ChainState {
                tenant_id: tenant_id.to_string(),
                last_sequence: last.sequence_number,
                last_hash: last.record_hash.clone(),
                last_timestamp: last.timestamp,
            };
        } else {
            warn!(tenant_id, "hydrate called on tenant with no persisted records");
        }
        Ok(())
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileChainBackend;
    use soc_core::{EventCategory, Severity};
    use tempfile::tempdir;

    fn draft(tenant_id: &str, event_type: &str) -> AuditRecord {
        let mut record = AuditRecord::genesis(tenant_id);
        record.event_type = event_type.to_string();
        record.event_category = EventCategory::Decision;
        record.severity = Severity::Low;
        record
    }

    #[tokio::test]
    async fn first_append_creates_genesis_then_links() {
        let dir = tempdir().unwrap();
        let writer = ChainWriter::new(FileChainBackend::new(dir.path()));

        let first = writer.append("tenant-a", draft("tenant-a", "alert.seen")).await.unwrap();
        assert_eq!(first.sequence_number, 1);
        assert_ne!(first.previous_hash, soc_core::GENESIS_HASH.replace('0', "x"));

        let all = writer.backend().read_all("tenant-a").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sequence_number, 0);
        assert_eq!(all[1].previous_hash, all[0].record_hash);
    }

    #[tokio::test]
    async fn concurrent_appends_for_same_tenant_stay_contiguous() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(ChainWriter::new(FileChainBackend::new(dir.path())));

        let mut handles = Vec::new();
        for i in 0..10 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .append("tenant-b", draft("tenant-b", &format!("event.{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut sequences: Vec<u64> = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap().sequence_number);
        }
        sequences.sort();
        assert_eq!(sequences, (1..=10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn hydrate_resumes_sequence_after_restart() {
        let dir = tempdir().unwrap();
        {
            let writer = ChainWriter::new(FileChainBackend::new(dir.path()));
            writer.append("tenant-c", draft("tenant-c", "alert.seen")).await.unwrap();
        }

        let writer = ChainWriter::new(FileChainBackend::new(dir.path()));
        writer.hydrate("tenant-c").await.unwrap();
        let next = writer.append("tenant-c", draft("tenant-c", "alert.closed")).await.unwrap();
        assert_eq!(next.sequence_number, 2);
    }
}
