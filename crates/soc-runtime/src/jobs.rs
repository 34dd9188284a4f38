//! [`Job`] adapters binding the detection runner, the retention
//! lifecycle, and the embedding migration job to the worker pool's
//! generic job-type registry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use soc_audit::{ChainBackend, ColdStorageBackend, LegalHoldRegistry, RetentionLifecycle};
use soc_llm::LlmProvider;
use soc_persist::{EmbedFn, OldModelSource, StorageBackend, VectorStoreBackend};
use soc_queue::job::{Job, JobResult};
use soc_queue::kinds;

use crate::runner::{DetectionRunPayload, DetectionRunner};

pub struct DetectionRunJob<B: ChainBackend, P: LlmProvider> {
    runner: Arc<DetectionRunner<B, P>>,
    payload: DetectionRunPayload,
}

impl<B: ChainBackend, P: LlmProvider> DetectionRunJob<B, P> {
    pub fn new(runner: Arc<DetectionRunner<B, P>>, payload: DetectionRunPayload) -> Self {
        Self { runner, payload }
    }
}

impl<B: ChainBackend, P: LlmProvider> std::fmt::Debug for DetectionRunJob<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionRunJob")
            .field("tenant_id", &self.payload.tenant_id)
            .field("alert_id", &self.payload.alert_id)
            .finish()
    }
}

#[async_trait]
impl<B: ChainBackend + 'static, P: LlmProvider + 'static> Job for DetectionRunJob<B, P> {
    fn name(&self) -> &str {
        kinds::DETECTION_RUN
    }

    async fn execute(&mut self) -> JobResult {
        match self.runner.run_detection(&self.payload).await {
            Ok(outcome) => JobResult::Success(Some(serde_json::to_value(outcome).unwrap_or_default())),
            Err(err) if err.is_retryable() => JobResult::Retry(err.to_string()),
            Err(err) => JobResult::Fatal(err.to_string()),
        }
    }
}

/// Payload for a retention-export job: the caller (a monthly cron-style
/// producer) has already gathered the partition's raw bytes from the
/// warm audit store, since the partition-to-sequence-range mapping is
/// the producer's concern, not the lifecycle's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionExportPayload {
    pub tenant_id: String,
    pub reference_date: DateTime<Utc>,
    pub partition_data: Vec<u8>,
}

pub struct RetentionExportJob<C: ColdStorageBackend, L: LegalHoldRegistry> {
    lifecycle: Arc<RetentionLifecycle<C, L>>,
    payload: RetentionExportPayload,
}

impl<C: ColdStorageBackend, L: LegalHoldRegistry> RetentionExportJob<C, L> {
    pub fn new(lifecycle: Arc<RetentionLifecycle<C, L>>, payload: RetentionExportPayload) -> Self {
        Self { lifecycle, payload }
    }
}

impl<C: ColdStorageBackend, L: LegalHoldRegistry> std::fmt::Debug for RetentionExportJob<C, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionExportJob").field("tenant_id", &self.payload.tenant_id).finish()
    }
}

#[async_trait]
impl<C: ColdStorageBackend + 'static, L: LegalHoldRegistry + 'static> Job for RetentionExportJob<C, L> {
    fn name(&self) -> &str {
        kinds::RETENTION_EXPORT
    }

    /// Exports the partition and, if the export verifies, immediately
    /// attempts the drop. A drop refused by the age-window or
    /// legal-hold predicate is not a job failure — the export itself
    /// still succeeded and will simply be retried again next cycle.
    async fn execute(&mut self) -> JobResult {
        match self
            .lifecycle
            .run_monthly_export(&self.payload.tenant_id, self.payload.reference_date, &self.payload.partition_data)
            .await
        {
            Ok((partition, verified)) => {
                let dropped = self
                    .lifecycle
                    .drop_old_partition(&partition, verified, self.payload.reference_date)
                    .await
                    .is_ok();
                JobResult::Success(Some(serde_json::json!({
                    "partition": partition.to_string(),
                    "export_verified": verified,
                    "dropped": dropped,
                })))
            }
            Err(err) => JobResult::Retry(err.to_string()),
        }
    }
}

pub struct EmbeddingMigrationJob<S: OldModelSource, V: VectorStoreBackend, E: EmbedFn, B: StorageBackend + ?Sized> {
    inner: Arc<soc_persist::EmbeddingMigrationJob<S, V, E, B>>,
    resume_from: Option<String>,
    tenant_id: String,
}

impl<S: OldModelSource, V: VectorStoreBackend, E: EmbedFn, B: StorageBackend + ?Sized> EmbeddingMigrationJob<S, V, E, B> {
    pub fn new(inner: Arc<soc_persist::EmbeddingMigrationJob<S, V, E, B>>, tenant_id: impl Into<String>, resume_from: Option<String>) -> Self {
        Self { inner, resume_from, tenant_id: tenant_id.into() }
    }
}

impl<S: OldModelSource, V: VectorStoreBackend, E: EmbedFn, B: StorageBackend + ?Sized> std::fmt::Debug for EmbeddingMigrationJob<S, V, E, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingMigrationJob").field("tenant_id", &self.tenant_id).finish()
    }
}

#[async_trait]
impl<S, V, E, B> Job for EmbeddingMigrationJob<S, V, E, B>
where
    S: OldModelSource + 'static,
    V: VectorStoreBackend + 'static,
    E: EmbedFn + 'static,
    B: StorageBackend + ?Sized + 'static,
{
    fn name(&self) -> &str {
        kinds::EMBEDDING_MIGRATION
    }

    async fn execute(&mut self) -> JobResult {
        match self.inner.run(self.resume_from.clone()).await {
            Ok(summary) => JobResult::Success(Some(serde_json::to_value(summary).unwrap_or_default())),
            Err(err) => JobResult::Retry(err.to_string()),
        }
    }
}
