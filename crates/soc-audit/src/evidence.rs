//! Content-addressed evidence blob storage.
//!
//! Large payloads (LLM prompts/responses, retrieval context) are stored
//! out-of-line from the audit record itself, keyed by their SHA-256
//! content hash. Storage errors never block the audit write path: a
//! failed put logs a warning and returns empty strings rather than
//! propagating, matching the platform's rule that audit writes must
//! never be gated on a secondary store's availability.

use async_trait::async_trait;
use chrono::Datelike;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Backend for content-addressed evidence blobs. Implementations must
/// apply server-side encryption with a KMS-managed key to every put.
#[async_trait]
pub trait EvidenceBackend: Send + Sync {
    async fn put(&self, key: &str, content: &[u8]) -> Result<(), String>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, String>;
}

/// In-memory evidence backend. Stands in for an SSE-KMS-enforcing
/// object store (S3 + `aws:kms`) in tests and single-node deployments;
/// a production deployment swaps in an object-store-backed
/// `EvidenceBackend` without touching `EvidenceStore`.
#[derive(Default)]
pub struct InMemoryEvidenceBackend {
    blobs: tokio::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl EvidenceBackend for InMemoryEvidenceBackend {
    async fn put(&self, key: &str, content: &[u8]) -> Result<(), String> {
        self.blobs.write().await.insert(key.to_string(), content.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, String> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| format!("no evidence blob at key {key}"))
    }
}

pub struct EvidenceStore<B: EvidenceBackend> {
    backend: B,
}

impl<B: EvidenceBackend> EvidenceStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn object_key(tenant_id: &str, audit_id: &str, evidence_type: &str) -> String {
        let now = chrono::Utc::now();
        format!(
            "{tenant_id}/{:04}/{:02}/{:02}/{audit_id}/{evidence_type}",
            now.year(),
            now.month(),
            now.day(),
        )
    }

    /// Store one evidence blob. On backend failure this fails open:
    /// returns empty strings and logs a warning instead of returning an
    /// error, so a storage outage never blocks an audit write.
    pub async fn store_evidence(
        &self,
        tenant_id: &str,
        audit_id: &str,
        evidence_type: &str,
        content: &[u8],
    ) -> (String, String) {
        let content_hash = hex::encode(Sha256::digest(content));
        let key = Self::object_key(tenant_id, audit_id, evidence_type);

        match self.backend.put(&key, content).await {
            Ok(()) => (content_hash, key),
            Err(err) => {
                warn!(tenant_id, audit_id, evidence_type, error = %err, "evidence store put failed, failing open");
                (String::new(), String::new())
            }
        }
    }

    pub async fn store_evidence_batch(
        &self,
        tenant_id: &str,
        audit_id: &str,
        items: &[(&str, &[u8])],
    ) -> Vec<(String, String)> {
        let mut results = Vec::with_capacity(items.len());
        for (evidence_type, content) in items {
            results.push(self.store_evidence(tenant_id, audit_id, evidence_type, content).await);
        }
        results
    }

    pub async fn retrieve_evidence(&self, uri: &str) -> Result<Vec<u8>, String> {
        self.backend.get(uri).await
    }

    /// Compares digests in constant time so a timing side channel can't
    /// leak how many leading bytes of a forged hash matched.
    pub async fn verify_evidence(&self, uri: &str, expected_hash: &str) -> bool {
        let Ok(expected) = hex::decode(expected_hash) else {
            return false;
        };
        match self.retrieve_evidence(uri).await {
            Ok(content) => Sha256::digest(&content).as_slice().ct_eq(&expected).into(),
            Err(_) => false,
        }
    }
}
