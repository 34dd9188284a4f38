//! Canary rollout: incremental promotion from shadow mode to full
//! autonomy for a `(dimension, value)` slice, with automatic
//! promotion criteria and a rollback safety net that takes priority
//! over promotion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::fp_eval::FPEvaluationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanaryStatus {
    Active,
    Promoted,
    RolledBack,
}

/// A canary rollout slice targeting a specific dimension/value, e.g.
/// `(tenant, "acme-corp")` or `(rule_family, "login_brute_force")`.
#[derive(Debug, Clone)]
pub struct CanarySlice {
    pub slice_id: String,
    pub dimension: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub status: CanaryStatus,
}

impl CanarySlice {
    pub fn new(slice_id: impl Into<String>, dimension: impl Into<String>, value: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            slice_id: slice_id.into(),
            dimension: dimension.into(),
            value: value.into(),
            created_at,
            promoted_at: None,
            status: CanaryStatus::Active,
        }
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 86_400.0
    }
}

#[derive(Debug, Clone)]
pub struct CanaryConfig {
    pub promotion_days: f64,
    pub min_precision: f64,
    pub rollback_precision: f64,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            promotion_days: 7.0,
            min_precision: 0.98,
            rollback_precision: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanaryDecision {
    Promote,
    Rollback,
    Continue,
}

/// Out-of-band override that forces a `(dimension, value)` pair back
/// to non-autonomous, human-reviewed handling.
#[async_trait]
pub trait KillSwitch: Send + Sync {
    async fn activate(&self, dimension: &str, value: &str, activated_by: &str, reason: &str);
}

/// Sink for the audit records promotion/rollback decisions must emit.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, event_type: &str, context: serde_json::Value);
}

#[derive(Debug, Clone)]
pub struct CanaryEvent {
    pub action: &'static str,
    pub slice_id: String,
    pub dimension: String,
    pub value: String,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Maps a canary slice's dimension to the kill switch's dimension
/// vocabulary. `rule_family` activates the kill switch's `pattern`
/// dimension; `severity` activates `tenant` (severity alone isn't a
/// kill-switchable target, so a severity-scoped canary rolls back by
/// suspending the tenant); everything else maps to itself.
fn kill_switch_dimension(canary_dimension: &str) -> &str {
    match canary_dimension {
        "rule_family" => "pattern",
        "severity" => "tenant",
        other => other,
    }
}

/// Decides and executes promotion/rollback for canary slices.
pub struct CanaryRolloutManager<K: KillSwitch, A: AuditSink> {
    kill_switch: K,
    audit: A,
    history: Vec<CanaryEvent>,
}

impl<K: KillSwitch, A: AuditSink> CanaryRolloutManager<K, A> {
    pub fn new(kill_switch: K, audit: A) -> Self {
        Self {
            kill_switch,
            audit,
            history: Vec::new(),
        }
    }

    /// Rollback checks run first, ahead of promotion: any missed true
    /// positive or sub-rollback-threshold precision rolls back
    /// regardless of slice age.
    pub fn check_promotion(
        &self,
        slice: &CanarySlice,
        precision: f64,
        missed_true_positives: u32,
        config: &CanaryConfig,
        now: DateTime<Utc>,
    ) -> CanaryDecision {
        if missed_true_positives > 0 || precision < config.rollback_precision {
            return CanaryDecision::Rollback;
        }

        if slice.age_days(now) >= config.promotion_days
            && precision >= config.min_precision
            && missed_true_positives == 0
        {
            return CanaryDecision::Promote;
        }

        CanaryDecision::Continue
    }

    pub async fn promote(&mut self, slice: &mut CanarySlice, now: DateTime<Utc>) {
        slice.status = CanaryStatus::Promoted;
        slice.promoted_at = Some(now);

        self.history.push(CanaryEvent {
            action: "promote",
            slice_id: slice.slice_id.clone(),
            dimension: slice.dimension.clone(),
            value: slice.value.clone(),
            reason: None,
            at: now,
        });
        tracing::info!(slice_id = %slice.slice_id, dimension = %slice.dimension, value = %slice.value, "canary slice promoted");

        self.audit
            .emit(
                "canary.promoted",
                json!({
                    "slice_id": slice.slice_id,
                    "dimension": slice.dimension,
                    "value": slice.value,
                    "promoted_at": now,
                }),
            )
            .await;
    }

    pub async fn rollback(&mut self, slice: &mut CanarySlice, reason: &str, now: DateTime<Utc>) {
        slice.status = CanaryStatus::RolledBack;

        self.history.push(CanaryEvent {
            action: "rollback",
            slice_id: slice.slice_id.clone(),
            dimension: slice.dimension.clone(),
            value: slice.value.clone(),
            reason: Some(reason.to_string()),
            at: now,
        });
        tracing::warn!(slice_id = %slice.slice_id, dimension = %slice.dimension, value = %slice.value, reason, "canary slice rolled back");

        self.kill_switch
            .activate(
                kill_switch_dimension(&slice.dimension),
                &slice.value,
                "canary_rollout_manager",
                &format!("canary rollback: {reason}"),
            )
            .await;

        self.audit
            .emit(
                "canary.rolled_back",
                json!({
                    "slice_id": slice.slice_id,
                    "dimension": slice.dimension,
                    "value": slice.value,
                    "reason": reason,
                }),
            )
            .await;
    }

    pub fn history(&self) -> &[CanaryEvent] {
        &self.history
    }
}

/// Supplies the latest FP-evaluation result for a canary slice's
/// value, so [`CanaryEvaluator`] doesn't need to know how evaluation
/// results are computed or stored.
pub trait FpEvaluationSource {
    fn latest_result(&self, value: &str) -> Option<FPEvaluationResult>;
}

/// Evaluates every active canary slice each cycle and applies the
/// promote/rollback decision.
pub struct CanaryEvaluator<'a, K: KillSwitch, A: AuditSink, S: FpEvaluationSource> {
    manager: &'a mut CanaryRolloutManager<K, A>,
    fp_source: &'a S,
}

impl<'a, K: KillSwitch, A: AuditSink, S: FpEvaluationSource> CanaryEvaluator<'a, K, A, S> {
    pub fn new(manager: &'a mut CanaryRolloutManager<K, A>, fp_source: &'a S) -> Self {
        Self { manager, fp_source }
    }

    pub async fn evaluate_all_slices(&mut self, slices: &mut [CanarySlice], config: &CanaryConfig, now: DateTime<Utc>) -> Vec<CanaryDecision> {
        let mut decisions = Vec::with_capacity(slices.len());

        for slice in slices.iter_mut() {
            if slice.status != CanaryStatus::Active {
                continue;
            }

            let evaluation = self.fp_source.latest_result(&slice.value);
            let precision = evaluation.as_ref().map(|e| e.precision).unwrap_or(1.0);
            let missed_tps = evaluation.as_ref().map(|e| e.false_positives).unwrap_or(0);

            let decision = self.manager.check_promotion(slice, precision, missed_tps, config, now);
            match decision {
                CanaryDecision::Promote => self.manager.promote(slice, now).await,
                CanaryDecision::Rollback => {
                    let reason = if missed_tps > 0 {
                        format!("missed_tps={missed_tps}")
                    } else {
                        "precision_below_threshold".to_string()
                    };
                    self.manager.rollback(slice, &reason, now).await;
                }
                CanaryDecision::Continue => {}
            }

            decisions.push(decision);
        }

        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingKillSwitch {
        activations: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl KillSwitch for RecordingKillSwitch {
        async fn activate(&self, dimension: &str, value: &str, _activated_by: &str, _reason: &str) {
            self.activations.lock().unwrap().push((dimension.to_string(), value.to_string()));
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuditSink for RecordingAudit {
        async fn emit(&self, event_type: &str, _context: serde_json::Value) {
            self.events.lock().unwrap().push(event_type.to_string());
        }
    }

    fn manager() -> CanaryRolloutManager<RecordingKillSwitch, RecordingAudit> {
        CanaryRolloutManager::new(RecordingKillSwitch::default(), RecordingAudit::default())
    }

    #[tokio::test]
    async fn missed_true_positive_rolls_back_even_if_promotion_criteria_met() {
        let mgr = manager();
        let now = Utc::now();
        let slice = CanarySlice::new("s1", "tenant", "acme-corp", now - chrono::Duration::days(30));
        let config = CanaryConfig::default();

        let decision = mgr.check_promotion(&slice, 0.99, 1, &config, now);
        assert_eq!(decision, CanaryDecision::Rollback);
    }

    #[tokio::test]
    async fn promotes_after_promotion_window_with_sufficient_precision() {
        let mgr = manager();
        let now = Utc::now();
        let slice = CanarySlice::new("s1", "tenant", "acme-corp", now - chrono::Duration::days(8));
        let config = CanaryConfig::default();

        let decision = mgr.check_promotion(&slice, 0.99, 0, &config, now);
        assert_eq!(decision, CanaryDecision::Promote);
    }

    #[tokio::test]
    async fn continues_before_promotion_window_elapses() {
        let mgr = manager();
        let now = Utc::now();
        let slice = CanarySlice::new("s1", "tenant", "acme-corp", now - chrono::Duration::days(1));
        let config = CanaryConfig::default();

        let decision = mgr.check_promotion(&slice, 0.99, 0, &config, now);
        assert_eq!(decision, CanaryDecision::Continue);
    }

    #[tokio::test]
    async fn rollback_activates_kill_switch_with_mapped_dimension() {
        let mut mgr = manager();
        let now = Utc::now();
        let mut slice = CanarySlice::new("s1", "rule_family", "login_brute_force", now);

        mgr.rollback(&mut slice, "precision_below_threshold", now).await;

        assert_eq!(slice.status, CanaryStatus::RolledBack);
        let activations = mgr.kill_switch.activations.lock().unwrap();
        assert_eq!(activations[0], ("pattern".to_string(), "login_brute_force".to_string()));
    }

    #[tokio::test]
    async fn promote_records_promoted_at_and_audit_event() {
        let mut mgr = manager();
        let now = Utc::now();
        let mut slice = CanarySlice::new("s1", "tenant", "acme-corp", now - chrono::Duration::days(8));

        mgr.promote(&mut slice, now).await;

        assert_eq!(slice.status, CanaryStatus::Promoted);
        assert_eq!(slice.promoted_at, Some(now));
        assert_eq!(mgr.audit.events.lock().unwrap().as_slice(), ["canary.promoted"]);
    }
}
