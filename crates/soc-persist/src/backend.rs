//! The generic key/value trait every warm-tier store in this crate
//! layers on: `AuditRecordStore`, `ContextStore`, and the SQLite/memory
//! vector stores all run against whichever `StorageBackend` the
//! deployment wires in, keyed by tenant-prefixed strings the stores
//! themselves own the format of.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Object-safe key/value surface. Every tenant-scoped store in this
/// crate builds its own key conventions (`audit:record:<tenant>:<seq>`,
/// `context:<id>`, ...) on top of this, so a deployment can swap
/// `MemoryBackend` for `SqliteBackend` without any store knowing.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn is_healthy(&self) -> bool;

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Every stored key starting with `prefix`. Backs `ContextStore`'s
    /// investigation-scoped lookups and count.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Typed `get`/`set` over any `StorageBackend`, so stores work with
/// their own record types instead of raw `serde_json::Value`.
#[async_trait]
pub trait StorageExt {
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError>;
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;
}

#[async_trait]
impl<S: StorageBackend + ?Sized> StorageExt for S {
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set_value(key, json).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_value(key).await? {
            Some(json) => {
                let value = serde_json::from_value(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// In-process backend for unit tests and single-node demos; holds
/// nothing across a process restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: tokio::sync::RwLock<std::collections::HashMap<String, serde_json::Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let keys: Vec<String> = data.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TenantRecord {
        tenant_id: String,
        value: i32,
    }

    #[tokio::test]
    async fn memory_backend_roundtrips_a_tenant_scoped_key() {
        let backend = MemoryBackend::new();
        let record = TenantRecord { tenant_id: "tenant-a".to_string(), value: 42 };

        backend.set("audit:record:tenant-a:1", &record).await.unwrap();

        let retrieved: Option<TenantRecord> = backend.get("audit:record:tenant-a:1").await.unwrap();
        assert_eq!(retrieved, Some(record));

        assert!(backend.exists("audit:record:tenant-a:1").await.unwrap());
        assert!(!backend.exists("audit:record:tenant-b:1").await.unwrap());

        let keys = backend.list_keys("audit:record:tenant-a:").await.unwrap();
        assert_eq!(keys, vec!["audit:record:tenant-a:1"]);

        assert!(backend.delete("audit:record:tenant-a:1").await.unwrap());
        assert!(!backend.exists("audit:record:tenant-a:1").await.unwrap());
    }
}
