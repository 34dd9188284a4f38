//! Evidence package assembly: a self-contained, hash-verifiable bundle
//! of every record related to an investigation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use soc_core::{verify_chain, AuditRecord};

use crate::backend::ChainBackend;
use crate::evidence::{EvidenceBackend, EvidenceStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePackage {
    pub package_id: uuid::Uuid,
    pub investigation_id: String,
    pub tenant_id: String,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub events: Vec<AuditRecord>,
    pub state_transitions: Vec<AuditRecord>,
    pub retrieval_context: Vec<AuditRecord>,
    pub llm_interactions: Vec<AuditRecord>,
    pub final_classification: Option<String>,
    pub final_confidence: Option<f64>,
    pub final_severity: Option<String>,
    pub reasoning_chain: Vec<String>,
    pub actions_executed: Vec<AuditRecord>,
    pub actions_pending: Vec<AuditRecord>,
    pub approvals: Vec<AuditRecord>,
    pub chain_verified: bool,
    pub chain_verification_errors: Vec<String>,
    #[serde(default)]
    pub package_hash: String,
}

fn references_llm_call(context: &serde_json::Value) -> bool {
    context.get("llm_call").is_some() || context.get("model_tier").is_some()
}

fn references_retrieval(context: &serde_json::Value) -> bool {
    context
        .get("retrieval_stores_queried")
        .and_then(|v| v.as_array())
        .map(|a| !a.is_empty())
        .unwrap_or(false)
}

fn outcome_status(outcome: &serde_json::Value) -> Option<&str> {
    outcome.get("status").and_then(|v| v.as_str())
}

fn evidence_refs(context: &serde_json::Value) -> Vec<String> {
    context
        .get("evidence_refs")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Evidence backend that refuses every call. Used as the type parameter
/// for builders constructed via [`EvidencePackageBuilder::new`], which
/// never fetch raw evidence and so never dispatch through it.
pub struct NoEvidenceBackend;

#[async_trait::async_trait]
impl EvidenceBackend for NoEvidenceBackend {
    async fn put(&self, _key: &str, _content: &[u8]) -> Result<(), String> {
        Err("no evidence backend configured for this package builder".to_string())
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, String> {
        Err("no evidence backend configured for this package builder".to_string())
    }
}

pub struct EvidencePackageBuilder<B: ChainBackend, E: EvidenceBackend = NoEvidenceBackend> {
    backend: B,
    evidence: Option<EvidenceStore<E>>,
}

impl<B: ChainBackend> EvidencePackageBuilder<B, NoEvidenceBackend> {
    pub fn new(backend: B) -> Self {
        Self { backend, evidence: None }
    }
}

impl<B: ChainBackend, E: EvidenceBackend> EvidencePackageBuilder<B, E> {
    /// Build a package that can also fetch raw evidence blobs by uri when
    /// `build_package` is called with `include_raw_evidence = true`.
    pub fn with_evidence_store(backend: B, evidence: EvidenceStore<E>) -> Self {
        Self { backend, evidence: Some(evidence) }
    }

    pub async fn build_package(
        &self,
        investigation_id: &str,
        tenant_id: &str,
        generated_by: &str,
        include_raw_evidence: bool,
    ) -> EvidencePackage {
        let all = self.backend.read_all(tenant_id).await.unwrap_or_default();
        let events: Vec<AuditRecord> = all
            .into_iter()
            .filter(|r| r.investigation_id.as_deref() == Some(investigation_id))
            .collect();

        let (valid, errors) = verify_chain(&events);

        let mut state_transitions = Vec::new();
        let mut llm_interactions = Vec::new();
        let mut actions_executed = Vec::new();
        let mut actions_pending = Vec::new();
        let mut approvals = Vec::new();
        let mut retrieval_context = Vec::new();

        for record in &events {
            if record.event_type.starts_with("investigation.") {
                state_transitions.push(record.clone());
            }
            if references_llm_call(&record.context) {
                llm_interactions.push(record.clone());
            }
            if references_retrieval(&record.context) {
                retrieval_context.push(record.clone());
            }
            if record.event_type.starts_with("response.") {
                match outcome_status(&record.outcome) {
                    Some("success") => actions_executed.push(record.clone()),
                    Some("pending_approval") => actions_pending.push(record.clone()),
                    _ => {}
                }
            }
            if record.event_type.starts_with("approval.") {
                approvals.push(record.clone());
            }
        }

        if include_raw_evidence {
            if let Some(store) = &self.evidence {
                for record in llm_interactions.iter_mut() {
                    let refs = evidence_refs(&record.context);
                    if refs.is_empty() {
                        continue;
                    }
                    let mut raw = serde_json::Map::new();
                    for uri in refs {
                        if let Ok(content) = store.retrieve_evidence(&uri).await {
                            raw.insert(uri, serde_json::Value::String(String::from_utf8_lossy(&content).into_owned()));
                        }
                    }
                    if let Some(obj) = record.context.as_object_mut() {
                        obj.insert("raw_evidence".to_string(), serde_json::Value::Object(raw));
                    }
                }
            }
        }

        let final_event = events
            .iter()
            .filter(|r| r.event_type == "alert.classified")
            .max_by_key(|r| r.sequence_number);

        let final_classification = final_event
            .and_then(|r| r.decision.get("classification"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let final_confidence = final_event
            .and_then(|r| r.decision.get("confidence"))
            .and_then(|v| v.as_f64());
        let final_severity = final_event.map(|r| format!("{:?}", r.severity).to_lowercase());
        let reasoning_chain = final_event
            .and_then(|r| r.decision.get("reasoning_chain"))
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut package = EvidencePackage {
            package_id: uuid::Uuid::new_v4(),
            investigation_id: investigation_id.to_string(),
            tenant_id: tenant_id.to_string(),
            generated_at: Utc::now(),
            generated_by: generated_by.to_string(),
            events,
            state_transitions,
            retrieval_context,
            llm_interactions,
            final_classification,
            final_confidence,
            final_severity,
            reasoning_chain,
            actions_executed,
            actions_pending,
            approvals,
            chain_verified: valid,
            chain_verification_errors: errors,
            package_hash: String::new(),
        };

        package.package_hash = Self::compute_package_hash(&package);
        package
    }

    fn compute_package_hash(package: &EvidencePackage) -> String {
        let mut value = serde_json::to_value(package).expect("EvidencePackage always serializes");
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("package_hash");
        }
        let canonical = serde_jcs::to_vec(&value).unwrap_or_else(|_| serde_json::to_vec(&value).unwrap_or_default());
        hex::encode(Sha256::digest(&canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainWriter;
    use crate::file::FileChainBackend;
    use soc_core::{EventCategory, Severity};
    use tempfile::tempdir;

    async fn seed(writer: &ChainWriter<FileChainBackend>, tenant: &str, investigation: &str) {
        let mut classified = AuditRecord::genesis(tenant);
        classified.event_type = "alert.classified".to_string();
        classified.event_category = EventCategory::Decision;
        classified.severity = Severity::High;
        classified.investigation_id = Some(investigation.to_string());
        classified.decision = serde_json::json!({"classification": "malicious", "confidence": 0.91, "reasoning_chain": ["matched known C2 domain"]});
        writer.append(tenant, classified).await.unwrap();

        let mut response = AuditRecord::genesis(tenant);
        response.event_type = "response.isolate_host".to_string();
        response.event_category = EventCategory::Response;
        response.investigation_id = Some(investigation.to_string());
        response.outcome = serde_json::json!({"status": "success"});
        writer.append(tenant, response).await.unwrap();

        let mut quarantine = AuditRecord::genesis(tenant);
        quarantine.event_type = "response.quarantine_mailbox".to_string();
        quarantine.event_category = EventCategory::Response;
        quarantine.investigation_id = Some(investigation.to_string());
        quarantine.outcome = serde_json::json!({"status": "pending_approval"});
        writer.append(tenant, quarantine).await.unwrap();

        let mut stale = AuditRecord::genesis(tenant);
        stale.event_type = "response.revoke_token".to_string();
        stale.event_category = EventCategory::Response;
        stale.investigation_id = Some(investigation.to_string());
        stale.outcome = serde_json::json!({"status": "rejected"});
        writer.append(tenant, stale).await.unwrap();

        let mut approval = AuditRecord::genesis(tenant);
        approval.event_type = "approval.granted".to_string();
        approval.event_category = EventCategory::Approval;
        approval.investigation_id = Some(investigation.to_string());
        writer.append(tenant, approval).await.unwrap();
    }

    #[tokio::test]
    async fn build_package_categorizes_records() {
        let dir = tempdir().unwrap();
        let writer = ChainWriter::new(FileChainBackend::new(dir.path()));
        seed(&writer, "tenant-a", "inv-1").await;

        let builder = EvidencePackageBuilder::new(FileChainBackend::new(dir.path()));
        let package = builder.build_package("inv-1", "tenant-a", "analyst-1", false).await;

        assert_eq!(package.final_classification.as_deref(), Some("malicious"));
        assert_eq!(package.actions_executed.len(), 1);
        assert_eq!(package.actions_pending.len(), 1);
        assert_eq!(package.approvals.len(), 1);
        assert!(package.chain_verified);
        assert!(!package.package_hash.is_empty());
    }

    #[tokio::test]
    async fn build_package_drops_actions_with_unrecognized_status() {
        let dir = tempdir().unwrap();
        let writer = ChainWriter::new(FileChainBackend::new(dir.path()));
        seed(&writer, "tenant-a", "inv-3").await;

        let builder = EvidencePackageBuilder::new(FileChainBackend::new(dir.path()));
        let package = builder.build_package("inv-3", "tenant-a", "analyst-1", false).await;

        let rejected_present = package
            .actions_executed
            .iter()
            .chain(package.actions_pending.iter())
            .any(|r| r.event_type == "response.revoke_token");
        assert!(!rejected_present);
    }

    #[tokio::test]
    async fn build_package_fetches_raw_evidence_when_requested() {
        use crate::evidence::{EvidenceStore, InMemoryEvidenceBackend};

        let dir = tempdir().unwrap();
        let writer = ChainWriter::new(FileChainBackend::new(dir.path()));
        seed(&writer, "tenant-a", "inv-4").await;

        let evidence_backend = InMemoryEvidenceBackend::default();
        let evidence_store = EvidenceStore::new(evidence_backend);
        let (_, uri) = evidence_store.store_evidence("tenant-a", "audit-1", "llm_prompt", b"full prompt text").await;

        let mut llm_call = AuditRecord::genesis("tenant-a");
        llm_call.event_type = "alert.classify_requested".to_string();
        llm_call.event_category = EventCategory::Decision;
        llm_call.investigation_id = Some("inv-4".to_string());
        llm_call.context = serde_json::json!({"llm_call": true, "evidence_refs": [uri.clone()]});
        writer.append("tenant-a", llm_call).await.unwrap();

        let builder = EvidencePackageBuilder::with_evidence_store(FileChainBackend::new(dir.path()), evidence_store);
        let package = builder.build_package("inv-4", "tenant-a", "analyst-1", true).await;

        let enriched = package
            .llm_interactions
            .iter()
            .find(|r| r.event_type == "alert.classify_requested")
            .expect("llm interaction present");
        assert_eq!(
            enriched.context["raw_evidence"][uri.as_str()].as_str(),
            Some("full prompt text")
        );
    }

    #[tokio::test]
    async fn package_hash_excludes_itself() {
        let dir = tempdir().unwrap();
        let writer = ChainWriter::new(FileChainBackend::new(dir.path()));
        seed(&writer, "tenant-a", "inv-2").await;

        let builder = EvidencePackageBuilder::new(FileChainBackend::new(dir.path()));
        let package = builder.build_package("inv-2", "tenant-a", "analyst-1", false).await;
        let recomputed = EvidencePackageBuilder::<FileChainBackend>::compute_package_hash(&package);
        assert_eq!(package.package_hash, recomputed);
    }
}
