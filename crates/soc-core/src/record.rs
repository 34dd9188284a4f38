//! The audit record: the atomic unit of the tamper-evident hash chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// High-level grouping of an audit record's event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    System,
    Investigation,
    Response,
    Approval,
    Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

/// Who or what performed the recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorType {
    Agent { agent_id: Uuid },
    Human { user_id: String },
    System,
}

impl ActorType {
    /// Replace a human identifier with its SHA-256 digest so the chain
    /// can be exported without leaking PII.
    pub fn pseudonymize(&self) -> Self {
        match self {
            Self::Human { user_id } => {
                use sha2::{Digest, Sha256};
                let mut hasher = Sha256::new();
                hasher.update(user_id.as_bytes());
                Self::Human {
                    user_id: hex::encode(hasher.finalize()),
                }
            }
            other => other.clone(),
        }
    }
}

/// An approval signature attached to an audit record requiring
/// multi-party authorization before an action executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_id: String,
    pub signed_at: DateTime<Utc>,
    pub signature_hex: String,
}

impl Signature {
    pub fn create(
        signer_id: impl Into<String>,
        message: &[u8],
        signing_key: &ed25519_dalek::SigningKey,
    ) -> Self {
        use ed25519_dalek::Signer;
        let signature = signing_key.sign(message);
        Self {
            signer_id: signer_id.into(),
            signed_at: Utc::now(),
            signature_hex: hex::encode(signature.to_bytes()),
        }
    }

    pub fn verify(
        &self,
        message: &[u8],
        verifying_key: &ed25519_dalek::VerifyingKey,
    ) -> bool {
        let Ok(sig_bytes) = hex::decode(&self.signature_hex) else {
            return false;
        };
        let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&sig_array);
        verifying_key.verify_strict(message, &signature).is_ok()
    }
}

/// The genesis `previous_hash` value for a tenant's first record.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000";

fn genesis_hash_64() -> String {
    "0".repeat(64)
}

/// A single entry in a tenant's tamper-evident hash chain.
///
/// `record_hash` is the SHA-256 hex digest of this record's canonical
/// JSON serialization with `record_hash` itself excluded; `previous_hash`
/// equals the prior record's `record_hash` for the same tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub tenant_id: String,
    pub sequence_number: u64,
    pub previous_hash: String,
    #[serde(default)]
    pub record_hash: String,
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub event_type: String,
    pub event_category: EventCategory,
    pub severity: Severity,
    pub actor_type: ActorType,
    pub actor_id: String,
    #[serde(default)]
    pub actor_permissions: Vec<String>,
    #[serde(default)]
    pub investigation_id: Option<String>,
    #[serde(default)]
    pub alert_id: Option<String>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub decision: serde_json::Value,
    #[serde(default)]
    pub outcome: serde_json::Value,
    pub record_version: String,
    pub source_service: String,
}

impl AuditRecord {
    /// Build the genesis record (sequence 0) for a brand-new tenant chain.
    pub fn genesis(tenant_id: impl Into<String>) -> Self {
        let tenant_id = tenant_id.into();
        let now = Utc::now();
        let mut record = Self {
            audit_id: Uuid::new_v4(),
            tenant_id,
            sequence_number: 0,
            previous_hash: genesis_hash_64(),
            record_hash: String::new(),
            timestamp: now,
            ingested_at: now,
            event_type: "system.genesis".to_string(),
            event_category: EventCategory::System,
            severity: Severity::Informational,
            actor_type: ActorType::System,
            actor_id: "audit-service".to_string(),
            actor_permissions: Vec::new(),
            investigation_id: None,
            alert_id: None,
            entity_ids: Vec::new(),
            context: serde_json::Value::Object(Default::default()),
            decision: serde_json::Value::Object(Default::default()),
            outcome: serde_json::Value::Object(Default::default()),
            record_version: "1.0".to_string(),
            source_service: "audit-service".to_string(),
        };
        record.record_hash = crate::chain::compute_record_hash(&record);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_64_zeros() {
        assert_eq!(genesis_hash_64().len(), 64);
        assert!(genesis_hash_64().chars().all(|c| c == '0'));
    }

    #[test]
    fn pseudonymize_hashes_human_ids() {
        let actor = ActorType::Human {
            user_id: "analyst@example.com".to_string(),
        };
        let pseudo = actor.pseudonymize();
        match pseudo {
            ActorType::Human { user_id } => {
                assert_ne!(user_id, "analyst@example.com");
                assert_eq!(user_id.len(), 64);
            }
            _ => panic!("expected Human variant"),
        }
    }
}
