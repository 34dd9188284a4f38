//! Warm-to-cold retention lifecycle.
//!
//! Three tiers: hot (durable queue, 30 days), warm (SQLite, 12 months),
//! cold (object store, 7 years). This module handles the warm→cold
//! boundary: monthly export with verification, and a three-predicate
//! gate before a warm partition is ever dropped.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sha2::{Digest, Sha256};

use crate::error::AuditError;

pub const WARM_RETENTION_MONTHS: i64 = 12;
pub const EXPORT_LAG_MONTHS: i64 = 2;
pub const BUFFER_MONTHS: i64 = 1;

/// A month-granularity partition identifier, e.g. "tenant-a/2026-03".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionId {
    pub tenant_id: String,
    pub year: i32,
    pub month: u32,
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{:04}-{:02}", self.tenant_id, self.year, self.month)
    }
}

fn months_before(reference: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    let total_months = reference.year() as i64 * 12 + reference.month() as i64 - 1 - months;
    let year = (total_months.div_euclid(12)) as i32;
    let month = (total_months.rem_euclid(12)) as u32 + 1;
    reference
        .with_day(1)
        .unwrap()
        .with_year(year)
        .unwrap()
        .with_month(month)
        .unwrap()
}

/// Backend capable of exporting a warm partition to cold storage.
#[async_trait]
pub trait ColdStorageBackend: Send + Sync {
    /// Export raw partition bytes, upload the export and a `.sha256`
    /// sidecar with SSE-KMS, and return the digest that was uploaded.
    async fn upload_export(&self, partition: &PartitionId, data: &[u8]) -> Result<String, AuditError>;

    /// Re-download a previously uploaded export for verification.
    async fn download_export(&self, partition: &PartitionId) -> Result<Vec<u8>, AuditError>;

    /// Permanently remove a warm-tier partition.
    async fn drop_partition(&self, partition: &PartitionId) -> Result<(), AuditError>;
}

/// Supplies legal-hold status so retention never drops held records.
#[async_trait]
pub trait LegalHoldRegistry: Send + Sync {
    async fn is_under_hold(&self, tenant_id: &str) -> bool;
}

pub struct RetentionLifecycle<C: ColdStorageBackend, L: LegalHoldRegistry> {
    cold: C,
    legal_hold: L,
}

impl<C: ColdStorageBackend, L: LegalHoldRegistry> RetentionLifecycle<C, L> {
    pub fn new(cold: C, legal_hold: L) -> Self {
        Self { cold, legal_hold }
    }

    /// Export the partition dated `reference_date - EXPORT_LAG_MONTHS`,
    /// re-downloading and re-hashing the upload to confirm it landed
    /// intact before it is ever eligible for drop.
    pub async fn run_monthly_export(
        &self,
        tenant_id: &str,
        reference_date: DateTime<Utc>,
        partition_data: &[u8],
    ) -> Result<(PartitionId, bool), AuditError> {
        let export_date = months_before(reference_date, EXPORT_LAG_MONTHS);
        let partition = PartitionId {
            tenant_id: tenant_id.to_string(),
            year: export_date.year(),
            month: export_date.month(),
        };

        let uploaded_digest = self.cold.upload_export(&partition, partition_data).await?;
        let downloaded = self.cold.download_export(&partition).await?;
        let rehashed = hex::encode(Sha256::digest(&downloaded));

        Ok((partition, rehashed == uploaded_digest))
    }

    /// Drop a warm partition. Only proceeds if all three predicates
    /// hold: the export was verified, the partition is older than the
    /// warm window plus the safety buffer, and no record in it belongs
    /// to a tenant under legal hold.
    pub async fn drop_old_partition(
        &self,
        partition: &PartitionId,
        export_verified: bool,
        reference_date: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        if !export_verified {
            return Err(AuditError::ExportUnverified(partition.to_string()));
        }

        let cutoff = months_before(reference_date, WARM_RETENTION_MONTHS + BUFFER_MONTHS);
        let partition_date = Utc
            .with_ymd_and_hms(partition.year, partition.month, 1, 0, 0, 0)
            .single()
            .expect("valid partition date");
        if partition_date > cutoff {
            return Err(AuditError::ExportUnverified(format!(
                "{partition} is within the warm retention + buffer window"
            )));
        }

        if self.legal_hold.is_under_hold(&partition.tenant_id).await {
            return Err(AuditError::LegalHold(partition.tenant_id.clone()));
        }

        self.cold.drop_partition(partition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeCold {
        uploads: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl ColdStorageBackend for FakeCold {
        async fn upload_export(&self, partition: &PartitionId, data: &[u8]) -> Result<String, AuditError> {
            self.uploads.lock().unwrap().insert(partition.to_string(), data.to_vec());
            Ok(hex::encode(Sha256::digest(data)))
        }
        async fn download_export(&self, partition: &PartitionId) -> Result<Vec<u8>, AuditError> {
            Ok(self.uploads.lock().unwrap().get(&partition.to_string()).cloned().unwrap_or_default())
        }
        async fn drop_partition(&self, _partition: &PartitionId) -> Result<(), AuditError> {
            Ok(())
        }
    }

    struct NoHolds;
    #[async_trait]
    impl LegalHoldRegistry for NoHolds {
        async fn is_under_hold(&self, _tenant_id: &str) -> bool {
            false
        }
    }

    struct AlwaysHeld;
    #[async_trait]
    impl LegalHoldRegistry for AlwaysHeld {
        async fn is_under_hold(&self, _tenant_id: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn export_verifies_by_rehash() {
        let lifecycle = RetentionLifecycle::new(
            FakeCold { uploads: Mutex::new(Default::default()) },
            NoHolds,
        );
        let reference = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let (partition, verified) = lifecycle
            .run_monthly_export("tenant-a", reference, b"partition bytes")
            .await
            .unwrap();
        assert!(verified);
        assert_eq!(partition.year, 2026);
        assert_eq!(partition.month, 6);
    }

    #[tokio::test]
    async fn drop_blocked_by_legal_hold() {
        let lifecycle = RetentionLifecycle::new(
            FakeCold { uploads: Mutex::new(Default::default()) },
            AlwaysHeld,
        );
        let old_partition = PartitionId { tenant_id: "tenant-a".to_string(), year: 2020, month: 1 };
        let result = lifecycle
            .drop_old_partition(&old_partition, true, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap())
            .await;
        assert!(matches!(result, Err(AuditError::LegalHold(_))));
    }

    #[tokio::test]
    async fn drop_blocked_when_still_within_buffer_window() {
        let lifecycle = RetentionLifecycle::new(
            FakeCold { uploads: Mutex::new(Default::default()) },
            NoHolds,
        );
        let recent_partition = PartitionId { tenant_id: "tenant-a".to_string(), year: 2026, month: 6 };
        let result = lifecycle
            .drop_old_partition(&recent_partition, true, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn drop_succeeds_exactly_at_the_cutoff_month() {
        let lifecycle = RetentionLifecycle::new(
            FakeCold { uploads: Mutex::new(Default::default()) },
            NoHolds,
        );
        // WARM_RETENTION_MONTHS + BUFFER_MONTHS = 13 months before 2026-08 is 2025-07.
        let cutoff_partition = PartitionId { tenant_id: "tenant-a".to_string(), year: 2025, month: 7 };
        let result = lifecycle
            .drop_old_partition(&cutoff_partition, true, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn drop_succeeds_when_all_three_predicates_hold() {
        let lifecycle = RetentionLifecycle::new(
            FakeCold { uploads: Mutex::new(Default::default()) },
            NoHolds,
        );
        let old_partition = PartitionId { tenant_id: "tenant-a".to_string(), year: 2020, month: 1 };
        let result = lifecycle
            .drop_old_partition(&old_partition, true, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap())
            .await;
        assert!(result.is_ok());
    }
}
