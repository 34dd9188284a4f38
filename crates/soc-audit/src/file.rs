//! File-based chain backend.
//!
//! Stores each tenant's chain as a JSON Lines file under a base
//! directory, one file per tenant. Suitable for development, testing,
//! and single-node deployments; production deployments back onto
//! `soc-persist`'s SQLite store instead.

use async_trait::async_trait;
use soc_core::AuditRecord;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::backend::ChainBackend;
use crate::error::AuditError;

#[derive(Debug, Clone)]
pub struct FileChainBackend {
    base_dir: PathBuf,
}

impl FileChainBackend {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path traversal in a tenant id would let one tenant read or
    /// clobber another tenant's chain file.
    fn tenant_path(&self, tenant_id: &str) -> Result<PathBuf, AuditError> {
        if tenant_id.is_empty() || tenant_id.contains(['.', '/', '\\']) {
            return Err(AuditError::BackendUnavailable(format!(
                "invalid tenant id for chain path: {tenant_id:?}"
            )));
        }
        Ok(self.base_dir.join(format!("{tenant_id}.jsonl")))
    }

    async fn read_lines(&self, tenant_id: &str) -> Result<Vec<AuditRecord>, AuditError> {
        let path = self.tenant_path(tenant_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str::<AuditRecord>(line)?);
        }
        records.sort_by_key(|r| r.sequence_number);
        Ok(records)
    }
}

#[async_trait]
impl ChainBackend for FileChainBackend {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        fs::create_dir_all(&self.base_dir).await?;
        let path = self.tenant_path(&record.tenant_id)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut json = serde_json::to_string(record)?;
        json.push('\n');
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_tail(&self, tenant_id: &str, limit: usize) -> Result<Vec<AuditRecord>, AuditError> {
        let mut records = self.read_lines(tenant_id).await?;
        if records.len() > limit {
            records = records.split_off(records.len() - limit);
        }
        Ok(records)
    }

    async fn read_all(&self, tenant_id: &str) -> Result<Vec<AuditRecord>, AuditError> {
        self.read_lines(tenant_id).await
    }

    fn name(&self) -> &str {
        "file"
    }

    async fn is_healthy(&self) -> bool {
        if !self.base_dir.exists() {
            return fs::create_dir_all(&self.base_dir).await.is_ok();
        }
        true
    }
}

impl FileChainBackend {
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_core::{chain_event, ChainState};
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_then_read_tail_roundtrips() {
        let dir = tempdir().unwrap();
        let backend = FileChainBackend::new(dir.path());

        let genesis = AuditRecord::genesis("tenant-a");
        backend.append(&genesis).await.unwrap();

        let tail = backend.read_tail("tenant-a", 10).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].audit_id, genesis.audit_id);
    }

    #[tokio::test]
    async fn rejects_path_traversal_tenant_ids() {
        let dir = tempdir().unwrap();
        let backend = FileChainBackend::new(dir.path());
        let mut evil = AuditRecord::genesis("../../etc");
        evil.tenant_id = "../../etc".to_string();
        let result = backend.append(&evil).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn read_tail_respects_limit() {
        let dir = tempdir().unwrap();
        let backend = FileChainBackend::new(dir.path());

        let genesis = AuditRecord::genesis("tenant-b");
        backend.append(&genesis).await.unwrap();
        let mut chain = ChainState::from_genesis(&genesis);

        for i in 0..5 {
            let mut record = AuditRecord::genesis("tenant-b");
            record.event_type = format!("event.{i}");
            let linked = chain_event(record, &chain);
            chain.advance(&linked);
            backend.append(&linked).await.unwrap();
        }

        let tail = backend.read_tail("tenant-b", 3).await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.last().unwrap().event_type, "event.4");
    }
}
