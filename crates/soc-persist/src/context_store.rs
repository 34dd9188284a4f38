//! Storage for context snapshots: the evidence bundle assembled for an
//! investigation (alert body, related entity history, prior decisions)
//! before it is handed to the router for classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{StorageBackend, StorageError, StorageExt};

/// A point-in-time bundle of evidence gathered for one investigation,
/// kept so a later audit or appeal can see exactly what the router and
/// LLM saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub id: Uuid,
    pub tenant_id: String,
    pub investigation_id: Option<String>,
    pub alert_id: Option<String>,
    pub entity_ids: Vec<String>,
    /// Free-form evidence payload (alert body, entity history, prior
    /// decisions) — shape owned by the caller, not this store.
    pub content: serde_json::Value,
    pub captured_at: DateTime<Utc>,
}

impl ContextSnapshot {
    pub fn new(tenant_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            investigation_id: None,
            alert_id: None,
            entity_ids: Vec::new(),
            content,
            captured_at: Utc::now(),
        }
    }
}

/// Persists context snapshots, indexed by id and by investigation.
#[derive(Debug)]
pub struct ContextStore<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    prefix: String,
}

impl<B: StorageBackend + ?Sized> ContextStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            prefix: "context:".to_string(),
        }
    }

    fn key(&self, id: Uuid) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn investigation_key(&self, tenant_id: &str, investigation_id: &str) -> String {
        format!("{}investigation:{}:{}", self.prefix, tenant_id, investigation_id)
    }

    /// Saves a snapshot, indexing it under its investigation if set.
    pub async fn save(&self, snapshot: &ContextSnapshot) -> Result<Uuid, StorageError> {
        self.backend.set(&self.key(snapshot.id), snapshot).await?;

        if let Some(investigation_id) = &snapshot.investigation_id {
            let index_key = self.investigation_key(&snapshot.tenant_id, investigation_id);
            let mut ids: Vec<Uuid> = self.backend.get(&index_key).await?.unwrap_or_default();
            ids.push(snapshot.id);
            self.backend.set(&index_key, &ids).await?;
        }

        Ok(snapshot.id)
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<ContextSnapshot>, StorageError> {
        self.backend.get(&self.key(id)).await
    }

    /// Loads every snapshot captured for an investigation, in the order
    /// they were saved.
    pub async fn load_by_investigation(
        &self,
        tenant_id: &str,
        investigation_id: &str,
    ) -> Result<Vec<ContextSnapshot>, StorageError> {
        let ids: Vec<Uuid> = self
            .backend
            .get(&self.investigation_key(tenant_id, investigation_id))
            .await?
            .unwrap_or_default();

        let mut snapshots = Vec::new();
        for id in ids {
            if let Some(snapshot) = self.load(id).await? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        self.backend.delete(&self.key(id)).await
    }

    pub async fn count(&self) -> Result<usize, StorageError> {
        let keys = self.backend.list_keys(&self.prefix).await?;
        Ok(keys.iter().filter(|k| !k.contains(":investigation:")).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn saves_and_loads_a_snapshot() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ContextStore::new(backend);

        let mut snapshot = ContextSnapshot::new("acme-corp", serde_json::json!({"alert": "brute-force"}));
        snapshot.investigation_id = Some("inv-1".to_string());
        let id = store.save(&snapshot).await.unwrap();

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.content["alert"], "brute-force");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn indexes_snapshots_by_investigation() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ContextStore::new(backend);

        let mut first = ContextSnapshot::new("acme-corp", serde_json::json!({"step": 1}));
        first.investigation_id = Some("inv-1".to_string());
        let mut second = ContextSnapshot::new("acme-corp", serde_json::json!({"step": 2}));
        second.investigation_id = Some("inv-1".to_string());

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let loaded = store.load_by_investigation("acme-corp", "inv-1").await.unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
