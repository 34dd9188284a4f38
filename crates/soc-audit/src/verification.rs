//! Four independently-scheduled chain verification checks.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use soc_core::{verify_chain, AuditRecord};

use crate::backend::ChainBackend;

pub const CONTINUOUS_RECORD_WINDOW: usize = 100;
pub const LAG_ALERT_THRESHOLD: u64 = 1000;
pub const COLD_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    Continuous,
    DailyFull,
    HourlyLag,
    WeeklyCold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub tenant_id: String,
    pub verification_type: VerificationType,
    pub records_checked: usize,
    pub chain_valid: bool,
    pub errors: Vec<String>,
    pub duration_ms: f64,
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    fn new(
        tenant_id: &str,
        verification_type: VerificationType,
        records_checked: usize,
        chain_valid: bool,
        errors: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let verified_at = Utc::now();
        let duration_ms = (verified_at - started_at).num_microseconds().unwrap_or(0) as f64 / 1000.0;
        Self {
            tenant_id: tenant_id.to_string(),
            verification_type,
            records_checked,
            chain_valid,
            errors,
            duration_ms,
            verified_at,
        }
    }
}

/// A side channel onto the durable ingestion queue, used only to read
/// the last-acked offset for the hourly lag check.
pub trait QueueOffsetSource: Send + Sync {
    fn last_acked_offset(&self, tenant_id: &str) -> u64;
}

/// A side channel onto cold storage's per-record hash sidecars, used
/// only by the weekly cold spot-check.
#[async_trait::async_trait]
pub trait ColdHashSidecar: Send + Sync {
    async fn hash_for(&self, tenant_id: &str, sequence_number: u64) -> Option<String>;
}

pub struct VerificationScheduler<B: ChainBackend> {
    backend: B,
}

impl<B: ChainBackend> VerificationScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Continuous check: verifies the last `CONTINUOUS_RECORD_WINDOW`
    /// records for a tenant. Cheap enough to run every few minutes.
    pub async fn verify_recent(&self, tenant_id: &str) -> VerificationResult {
        let started_at = Utc::now();
        let records = self
            .backend
            .read_tail(tenant_id, CONTINUOUS_RECORD_WINDOW)
            .await
            .unwrap_or_default();
        let (valid, errors) = verify_chain(&records);
        VerificationResult::new(tenant_id, VerificationType::Continuous, records.len(), valid, errors, started_at)
    }

    /// Daily full check: verifies a tenant's entire chain.
    pub async fn verify_tenant_chain(&self, tenant_id: &str) -> VerificationResult {
        let started_at = Utc::now();
        let records = self.backend.read_all(tenant_id).await.unwrap_or_default();
        let (valid, errors) = verify_chain(&records);
        VerificationResult::new(tenant_id, VerificationType::DailyFull, records.len(), valid, errors, started_at)
    }

    /// Hourly lag check: flags when the durable queue's acked offset
    /// for a tenant has run more than `LAG_ALERT_THRESHOLD` records
    /// ahead of what has actually been persisted to the chain.
    pub async fn verify_lag(&self, tenant_id: &str, queue: &impl QueueOffsetSource) -> VerificationResult {
        let started_at = Utc::now();
        let records = self.backend.read_all(tenant_id).await.unwrap_or_default();
        let max_sequence = records.iter().map(|r| r.sequence_number).max().unwrap_or(0);
        let offset = queue.last_acked_offset(tenant_id);
        let lag = offset.saturating_sub(max_sequence);

        let mut errors = Vec::new();
        if lag > LAG_ALERT_THRESHOLD {
            errors.push(format!("queue offset {offset} is {lag} records ahead of persisted max sequence {max_sequence}"));
        }
        VerificationResult::new(tenant_id, VerificationType::HourlyLag, records.len(), errors.is_empty(), errors, started_at)
    }

    /// Weekly cold check: samples `COLD_SAMPLE_SIZE` records at random
    /// and compares their digests against cold storage's hash sidecar.
    pub async fn verify_cold_sample(&self, tenant_id: &str, sidecar: &impl ColdHashSidecar) -> VerificationResult {
        let started_at = Utc::now();
        let mut records = self.backend.read_all(tenant_id).await.unwrap_or_default();
        let mut rng = rand::thread_rng();
        records.shuffle(&mut rng);
        records.truncate(COLD_SAMPLE_SIZE);

        let mut errors = Vec::new();
        for record in &records {
            match sidecar.hash_for(tenant_id, record.sequence_number).await {
                Some(expected) if expected == record.record_hash => {}
                Some(_) => errors.push(format!("cold sidecar mismatch at sequence {}", record.sequence_number)),
                None => errors.push(format!("no cold sidecar entry for sequence {}", record.sequence_number)),
            }
        }

        VerificationResult::new(tenant_id, VerificationType::WeeklyCold, records.len(), errors.is_empty(), errors, started_at)
    }
}
