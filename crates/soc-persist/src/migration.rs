//! Checkpointed re-embedding of stored vectors to a new embedding
//! model: idempotent upsert by point id, rate-limited against the
//! destination store, resumable from the last persisted checkpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{StorageBackend, StorageError, StorageExt};
use crate::vector_store::{VectorEmbedding, VectorError, VectorStoreBackend};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_RATE_LIMIT_RPS: f64 = 10.0;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("vector store error: {0}")]
    Vector(#[from] VectorError),
    #[error("checkpoint storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("embedding function error: {0}")]
    Embed(String),
}

/// Re-embeds a point's metadata payload under the new model.
#[async_trait]
pub trait EmbedFn: Send + Sync {
    async fn embed(&self, metadata: &HashMap<String, String>) -> Result<Vec<f32>, MigrationError>;
}

/// Source of old-model points to migrate, in a stable id order so
/// pagination after a checkpoint is deterministic.
#[async_trait]
pub trait OldModelSource: Send + Sync {
    async fn fetch_after(
        &self,
        tenant_id: &str,
        old_model: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VectorEmbedding>, MigrationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub tenant_id: String,
    pub old_model: String,
    pub new_model: String,
    pub collection: String,
    pub last_point_id: Option<String>,
    pub points_migrated: u64,
    pub status: MigrationStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub old_model: String,
    pub new_model: String,
    pub points_migrated: u64,
    pub last_point_id: Option<String>,
}

/// Re-embeds every point under `old_model` in a tenant's collection to
/// `new_model`, writing results through `destination` and persisting
/// progress through `checkpoints` every `batch_size` points.
pub struct EmbeddingMigrationJob<S, V, E, B>
where
    S: OldModelSource,
    V: VectorStoreBackend,
    E: EmbedFn,
    B: StorageBackend + ?Sized,
{
    source: S,
    destination: Arc<V>,
    embed_fn: E,
    checkpoints: Arc<B>,
    tenant_id: String,
    old_model: String,
    new_model: String,
    collection: String,
    batch_size: usize,
    min_interval: Duration,
}

impl<S, V, E, B> EmbeddingMigrationJob<S, V, E, B>
where
    S: OldModelSource,
    V: VectorStoreBackend,
    E: EmbedFn,
    B: StorageBackend + ?Sized,
{
    pub fn new(
        source: S,
        destination: Arc<V>,
        embed_fn: E,
        checkpoints: Arc<B>,
        tenant_id: impl Into<String>,
        old_model: impl Into<String>,
        new_model: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            embed_fn,
            checkpoints,
            tenant_id: tenant_id.into(),
            old_model: old_model.into(),
            new_model: new_model.into(),
            collection: collection.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            min_interval: Self::interval_for(DEFAULT_RATE_LIMIT_RPS),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_rate_limit_rps(mut self, rate_limit_rps: f64) -> Self {
        self.min_interval = Self::interval_for(rate_limit_rps);
        self
    }

    fn interval_for(rate_limit_rps: f64) -> Duration {
        if rate_limit_rps > 0.0 {
            Duration::from_secs_f64(1.0 / rate_limit_rps)
        } else {
            Duration::ZERO
        }
    }

    fn checkpoint_key(&self) -> String {
        format!(
            "migration:checkpoint:{}:{}:{}:{}",
            self.tenant_id, self.old_model, self.new_model, self.collection
        )
    }

    async fn load_checkpoint(&self) -> Result<Option<MigrationProgress>, MigrationError> {
        Ok(self.checkpoints.get(&self.checkpoint_key()).await?)
    }

    async fn save_checkpoint(&self, progress: &MigrationProgress) -> Result<(), MigrationError> {
        self.checkpoints.set(&self.checkpoint_key(), progress).await?;
        Ok(())
    }

    /// Runs the migration, resuming from `resume_from` if given,
    /// otherwise from the last persisted checkpoint's point id.
    pub async fn run(&self, resume_from: Option<String>) -> Result<MigrationSummary, MigrationError> {
        let existing = self.load_checkpoint().await?;
        let mut cursor = resume_from.or_else(|| existing.and_then(|p| p.last_point_id));

        let mut migrated: u64 = 0;
        let mut last_id = cursor.clone();
        let mut last_op = None::<Instant>;

        loop {
            let batch = self
                .source
                .fetch_after(&self.tenant_id, &self.old_model, cursor.as_deref(), self.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            for point in &batch {
                if let Some(previous) = last_op {
                    let elapsed = previous.elapsed();
                    if elapsed < self.min_interval {
                        tokio::time::sleep(self.min_interval - elapsed).await;
                    }
                }

                let new_vector = self.embed_fn.embed(&point.metadata).await?;

                let mut metadata = point.metadata.clone();
                metadata.insert("embedding_model_id".to_string(), self.new_model.clone());
                metadata.insert("embedding_version".to_string(), Utc::now().format("%Y-%m").to_string());

                self.destination
                    .add(point.id.clone(), self.tenant_id.clone(), new_vector, metadata)
                    .await?;

                last_op = Some(Instant::now());
                migrated += 1;
                last_id = Some(point.id.clone());

                if migrated % self.batch_size as u64 == 0 {
                    self.save_checkpoint(&MigrationProgress {
                        tenant_id: self.tenant_id.clone(),
                        old_model: self.old_model.clone(),
                        new_model: self.new_model.clone(),
                        collection: self.collection.clone(),
                        last_point_id: last_id.clone(),
                        points_migrated: migrated,
                        status: MigrationStatus::InProgress,
                        updated_at: Utc::now(),
                    })
                    .await?;
                }
            }

            cursor = last_id.clone();
        }

        self.save_checkpoint(&MigrationProgress {
            tenant_id: self.tenant_id.clone(),
            old_model: self.old_model.clone(),
            new_model: self.new_model.clone(),
            collection: self.collection.clone(),
            last_point_id: last_id.clone(),
            points_migrated: migrated,
            status: MigrationStatus::Completed,
            updated_at: Utc::now(),
        })
        .await?;

        Ok(MigrationSummary {
            old_model: self.old_model.clone(),
            new_model: self.new_model.clone(),
            points_migrated: migrated,
            last_point_id: last_id,
        })
    }
}
