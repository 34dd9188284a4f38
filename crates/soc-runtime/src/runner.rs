//! Detection runner: the scheduling loop that binds routing, the
//! resilient LLM dispatch, the audit chain, and the autonomy threshold
//! gate into a single per-job unit of work.
//!
//! One call to [`DetectionRunner::run_detection`] handles one alert:
//! resolve the task's tier, acquire a concurrency slot and check the
//! tenant's hourly quota, dispatch through the resilient provider
//! (which records the outcome against its circuit breaker), write an
//! audit record for every state transition, and gate any auto-closure
//! on the tenant's currently-effective confidence threshold.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use soc_audit::{AuditError, ChainBackend, ChainWriter};
use soc_autonomy::drift::NORMAL_THRESHOLD;
use soc_autonomy::fp_eval::{AutonomyGuard, FPEvaluationResult};
use soc_core::{ActorType, AuditRecord, EventCategory, Severity};
use soc_llm::{CircuitConfig, ConcurrencyController, LlmProvider, LlmRequest, Priority, ProviderHealthRegistry, ResilientProvider, TenantQuota, TenantTier};
use soc_router::{route_with_health, Capability, ModelTier, RoutingDecision, TaskContext, TaskType};

use crate::error::RunnerError;

/// The job payload a detection-run job is dequeued with. `task_type`
/// and `tenant_tier` are carried as strings since the payload travels
/// through the queue's `serde_json::Value` storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRunPayload {
    pub tenant_id: String,
    pub tenant_tier: String,
    pub alert_id: String,
    pub investigation_id: Option<String>,
    pub task_type: String,
    pub severity: String,
    pub context_tokens: u32,
    pub time_budget_seconds: u32,
    pub requires_reasoning: bool,
    pub previous_confidence: Option<f64>,
    pub system_prompt: String,
    pub prompt: String,
}

/// Outcome of one detection run, the value a completed job leaves in
/// the queue's result slot.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionOutcome {
    pub tier: ModelTier,
    pub confidence: Option<f64>,
    pub auto_closed: bool,
    pub reason: String,
}

fn parse_task_type(s: &str) -> Option<TaskType> {
    use TaskType::*;
    Some(match s {
        "ioc_extraction" => IocExtraction,
        "log_summarisation" => LogSummarisation,
        "entity_normalisation" => EntityNormalisation,
        "fp_suggestion" => FpSuggestion,
        "alert_classification" => AlertClassification,
        "severity_assessment" => SeverityAssessment,
        "investigation" => Investigation,
        "ctem_correlation" => CtemCorrelation,
        "atlas_reasoning" => AtlasReasoning,
        "attack_path_analysis" => AttackPathAnalysis,
        "incident_report" => IncidentReport,
        "playbook_selection" => PlaybookSelection,
        "fp_pattern_training" => FpPatternTraining,
        "playbook_generation" => PlaybookGeneration,
        "agent_red_team" => AgentRedTeam,
        "detection_rule_generation" => DetectionRuleGeneration,
        "retrospective_analysis" => RetrospectiveAnalysis,
        "threat_landscape_summary" => ThreatLandscapeSummary,
        _ => return None,
    })
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Informational,
    }
}

fn parse_tenant_tier(s: &str) -> TenantTier {
    match s {
        "premium" => TenantTier::Premium,
        "trial" => TenantTier::Trial,
        _ => TenantTier::Standard,
    }
}

/// Tier2 is batch-eligible and never latency-sensitive, so it always
/// runs at the lowest priority regardless of the alert's severity.
fn priority_for(severity: Severity, tier: ModelTier) -> Priority {
    if tier == ModelTier::Tier2 {
        return Priority::Low;
    }
    match severity {
        Severity::Critical => Priority::Critical,
        Severity::High => Priority::High,
        Severity::Medium => Priority::Normal,
        Severity::Low | Severity::Informational => Priority::Low,
    }
}

/// Best-effort extraction of a `confidence` field from a classification
/// response's JSON body. A response that isn't JSON, or has no
/// `confidence` field, yields `None` rather than an error — the
/// auto-closure gate below treats that the same as a confidence too low
/// to close.
fn extract_confidence(content: &str) -> Option<f64> {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|v| v.get("confidence").and_then(|c| c.as_f64()))
}

pub struct DetectionRunner<B: ChainBackend, P: LlmProvider> {
    chain: Arc<ChainWriter<B>>,
    concurrency: Arc<ConcurrencyController>,
    quota: Arc<TenantQuota>,
    provider: Arc<ResilientProvider<P>>,
    health: Arc<ProviderHealthRegistry>,
    autonomy: AutonomyGuard,
    thresholds: RwLock<HashMap<String, f64>>,
}

impl<B: ChainBackend, P: LlmProvider + 'static> DetectionRunner<B, P> {
    pub fn new(chain: Arc<ChainWriter<B>>, provider: Arc<ResilientProvider<P>>) -> Self {
        Self {
            chain,
            concurrency: Arc::new(ConcurrencyController::new()),
            quota: Arc::new(TenantQuota::new()),
            provider,
            health: Arc::new(ProviderHealthRegistry::new(CircuitConfig::default())),
            autonomy: AutonomyGuard::new(),
            thresholds: RwLock::new(HashMap::new()),
        }
    }

    /// The confidence an auto-closure must clear for this tenant right
    /// now: [`NORMAL_THRESHOLD`] unless a prior FP evaluation raised it.
    pub async fn effective_threshold(&self, tenant_id: &str) -> f64 {
        self.thresholds.read().await.get(tenant_id).copied().unwrap_or(NORMAL_THRESHOLD)
    }

    /// Feeds a false-positive evaluation result back into the tenant's
    /// effective threshold, called by the periodic FP-evaluation job.
    pub async fn apply_evaluation(&self, tenant_id: &str, evaluation: &FPEvaluationResult) {
        let mut guard = self.thresholds.write().await;
        let current = guard.get(tenant_id).copied().unwrap_or(NORMAL_THRESHOLD);
        guard.insert(tenant_id.to_string(), self.autonomy.get_adjusted_threshold(current, evaluation));
    }

    async fn write(&self, tenant_id: &str, event_type: &str, category: EventCategory, severity: Severity, payload: &DetectionRunPayload, context: serde_json::Value, decision: serde_json::Value, outcome: serde_json::Value) -> Result<(), AuditError> {
        let mut record = AuditRecord::genesis(tenant_id);
        record.event_type = event_type.to_string();
        record.event_category = category;
        record.severity = severity;
        record.actor_type = ActorType::System;
        record.actor_id = "detection-runner".to_string();
        record.investigation_id = payload.investigation_id.clone();
        record.alert_id = Some(payload.alert_id.clone());
        record.context = context;
        record.decision = decision;
        record.outcome = outcome;
        record.source_service = "soc-runtime".to_string();
        self.chain.append(tenant_id, record).await.map(|_| ())
    }

    pub async fn run_detection(&self, payload: &DetectionRunPayload) -> Result<DetectionOutcome, RunnerError> {
        let task_type = parse_task_type(&payload.task_type).unwrap_or(TaskType::AlertClassification);
        let severity = parse_severity(&payload.severity);
        let tenant_tier = parse_tenant_tier(&payload.tenant_tier);

        let mut ctx = TaskContext::new(task_type);
        ctx.context_tokens = payload.context_tokens;
        ctx.time_budget_seconds = payload.time_budget_seconds;
        ctx.alert_severity = severity;
        ctx.requires_reasoning = payload.requires_reasoning;
        ctx.previous_confidence = payload.previous_confidence;
        if matches!(task_type, TaskType::Investigation | TaskType::CtemCorrelation) {
            ctx.required_capabilities.push(Capability::ToolUse);
        }

        let decision: RoutingDecision = route_with_health(&ctx, &self.health).await?;
        let priority = priority_for(severity, decision.tier);

        self.quota.check_tenant_quota(&payload.tenant_id, tenant_tier).await?;

        if !self.concurrency.acquire(priority).await {
            return Err(RunnerError::ConcurrencyExhausted);
        }

        self.write(
            &payload.tenant_id,
            "detection.dispatched",
            EventCategory::Decision,
            severity,
            payload,
            serde_json::json!({"model_tier": format!("{:?}", decision.tier), "reason": decision.reason}),
            serde_json::json!({}),
            serde_json::json!({"status": "dispatched"}),
        )
        .await?;

        let request = LlmRequest {
            tenant_id: Some(payload.tenant_id.clone()),
            system: payload.system_prompt.clone(),
            prompt: payload.prompt.clone(),
            temperature: decision.temperature as f32,
            max_tokens: decision.max_tokens,
        };

        let dispatch_result = self.provider.complete(request).await;
        self.concurrency.release(priority).await;

        let response = match dispatch_result {
            Ok(response) => {
                self.health.breaker(&decision.model.provider).await.record_success().await;
                response
            }
            Err(err) => {
                self.health.breaker(&decision.model.provider).await.record_failure().await;
                self.write(
                    &payload.tenant_id,
                    "detection.failed",
                    EventCategory::Decision,
                    severity,
                    payload,
                    serde_json::json!({"model_tier": format!("{:?}", decision.tier)}),
                    serde_json::json!({}),
                    serde_json::json!({"status": "failed", "error": err.to_string()}),
                )
                .await?;
                return Err(err.into());
            }
        };

        self.quota.record_tenant_call(&payload.tenant_id).await;

        let confidence = extract_confidence(&response.content);
        let threshold = self.effective_threshold(&payload.tenant_id).await;
        let auto_closed = confidence.is_some_and(|c| c >= threshold);

        let outcome_event = if auto_closed { "alert.closed" } else { "alert.escalated_for_review" };
        self.write(
            &payload.tenant_id,
            outcome_event,
            EventCategory::Decision,
            severity,
            payload,
            serde_json::json!({"model_tier": format!("{:?}", decision.tier), "llm_call": {"model": response.model, "tokens_used": response.tokens_used}}),
            serde_json::json!({"confidence": confidence, "raw_response": response.content}),
            serde_json::json!({"status": if auto_closed { "auto_closed" } else { "escalated" }, "threshold": threshold, "at": Utc::now()}),
        )
        .await?;

        Ok(DetectionOutcome {
            tier: decision.tier,
            confidence,
            auto_closed,
            reason: decision.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_audit::FileChainBackend;
    use soc_llm::MockProvider;
    use tempfile::tempdir;

    fn payload(tenant_id: &str) -> DetectionRunPayload {
        DetectionRunPayload {
            tenant_id: tenant_id.to_string(),
            tenant_tier: "standard".to_string(),
            alert_id: "alert-1".to_string(),
            investigation_id: Some("inv-1".to_string()),
            task_type: "alert_classification".to_string(),
            severity: "high".to_string(),
            context_tokens: 500,
            time_budget_seconds: 30,
            requires_reasoning: false,
            previous_confidence: None,
            system_prompt: "classify the alert".to_string(),
            prompt: "suspicious login from new geography".to_string(),
        }
    }

    fn runner(provider: MockProvider, dir: &std::path::Path) -> DetectionRunner<FileChainBackend, MockProvider> {
        let chain = Arc::new(ChainWriter::new(FileChainBackend::new(dir)));
        let provider = Arc::new(ResilientProvider::wrap(provider));
        DetectionRunner::new(chain, provider)
    }

    #[tokio::test]
    async fn high_confidence_response_auto_closes_and_writes_audit_trail() {
        let dir = tempdir().unwrap();
        let runner = runner(MockProvider::classifier(), dir.path());

        let outcome = runner.run_detection(&payload("acme-corp")).await.unwrap();
        assert!(outcome.auto_closed);
        assert_eq!(outcome.confidence, Some(0.82));

        let all = runner.chain.backend().read_all("acme-corp").await.unwrap();
        let event_types: Vec<&str> = all.iter().map(|r| r.event_type.as_str()).collect();
        assert!(event_types.contains(&"detection.dispatched"));
        assert!(event_types.contains(&"alert.closed"));
    }

    #[tokio::test]
    async fn non_json_response_does_not_auto_close() {
        let dir = tempdir().unwrap();
        let runner = runner(MockProvider::constant("looks benign, no structured verdict"), dir.path());

        let outcome = runner.run_detection(&payload("acme-corp")).await.unwrap();
        assert!(!outcome.auto_closed);
        assert_eq!(outcome.confidence, None);

        let all = runner.chain.backend().read_all("acme-corp").await.unwrap();
        assert!(all.iter().any(|r| r.event_type == "alert.escalated_for_review"));
    }

    #[tokio::test]
    async fn raised_threshold_from_a_prior_evaluation_blocks_auto_closure() {
        let dir = tempdir().unwrap();
        let runner = runner(MockProvider::classifier(), dir.path());

        let mut evaluation = FPEvaluationResult::new("login_brute_force");
        evaluation.true_positives = 80;
        evaluation.false_positives = 20;
        evaluation.compute_metrics();
        runner.apply_evaluation("acme-corp", &evaluation).await;
        assert!(runner.effective_threshold("acme-corp").await > NORMAL_THRESHOLD);

        let outcome = runner.run_detection(&payload("acme-corp")).await.unwrap();
        assert!(!outcome.auto_closed);
    }

    #[tokio::test]
    async fn provider_failure_writes_a_failed_record_and_returns_retryable_error() {
        let dir = tempdir().unwrap();
        let mock = MockProvider::constant("unused");
        mock.set_available(false);
        let runner = runner(mock, dir.path());

        let err = runner.run_detection(&payload("acme-corp")).await.unwrap_err();
        assert!(err.is_retryable());

        let all = runner.chain.backend().read_all("acme-corp").await.unwrap();
        assert!(all.iter().any(|r| r.event_type == "detection.failed"));
    }
}
