//! False-positive auto-closure evaluation: stratified sampling of
//! auto-closed alerts, precision/recall scoring, continuous
//! false-negative detection, and the autonomy guardrail that ties
//! evaluation results back to the router's confidence threshold.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const PRECISION_TARGET: f64 = 0.98;
pub const RECALL_TARGET: f64 = 0.95;
pub const FNR_CEILING: f64 = 0.005;
const NOVEL_PATTERN_DAYS: i64 = 30;
const MIN_SAMPLE_PER_STRATUM: usize = 30;

/// A single auto-closure decision under evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub alert_id: String,
    pub rule_family: String,
    pub severity: String,
    pub asset_criticality: String,
    pub pattern_id: String,
    pub pattern_created_at: DateTime<Utc>,
    /// Whether the closure was later confirmed a true false positive.
    pub was_false_positive: bool,
}

impl Closure {
    fn stratum_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.rule_family, self.severity, self.asset_criticality
        )
    }

    fn is_novel(&self, now: DateTime<Utc>) -> bool {
        (now - self.pattern_created_at).num_days() < NOVEL_PATTERN_DAYS
    }
}

/// Precision/recall/FNR for one rule family, derived from raw counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FPEvaluationResult {
    pub rule_family: String,
    pub total_closures: u32,
    pub true_positives: u32,
    pub false_positives: u32,
    pub false_negatives: u32,
    pub precision: f64,
    pub recall: f64,
    pub fnr: f64,
}

impl FPEvaluationResult {
    pub fn new(rule_family: impl Into<String>) -> Self {
        Self {
            rule_family: rule_family.into(),
            ..Default::default()
        }
    }

    /// Recomputes precision, recall, and FNR from the raw counts.
    /// Empty denominators default precision/recall to 1.0 and FNR to
    /// 0.0 rather than propagating a division by zero.
    pub fn compute_metrics(&mut self) {
        let tp = self.true_positives as f64;
        let fp = self.false_positives as f64;
        let fn_ = self.false_negatives as f64;

        self.precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 1.0 };
        self.recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 1.0 };
        self.fnr = if fn_ + tp > 0.0 { fn_ / (fn_ + tp) } else { 0.0 };
    }
}

/// Stratified sampling over auto-closures, grouped by
/// `(rule_family, severity, asset_criticality)`.
#[derive(Debug, Default)]
pub struct FPEvaluationFramework;

impl FPEvaluationFramework {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_strata<'a>(&self, closures: &'a [Closure]) -> HashMap<String, Vec<&'a Closure>> {
        let mut strata: HashMap<String, Vec<&Closure>> = HashMap::new();
        for closure in closures {
            strata.entry(closure.stratum_key()).or_default().push(closure);
        }
        strata
    }

    /// 100% of novel-pattern closures, plus a random top-up to at
    /// least `min_per_stratum` from the remainder of each stratum.
    pub fn select_sample<'a>(
        &self,
        strata: &HashMap<String, Vec<&'a Closure>>,
        now: DateTime<Utc>,
        min_per_stratum: usize,
    ) -> Vec<&'a Closure> {
        let mut rng = rand::thread_rng();
        let mut sample = Vec::new();

        for closures in strata.values() {
            let (novel, non_novel): (Vec<&&Closure>, Vec<&&Closure>) =
                closures.iter().partition(|c| c.is_novel(now));

            sample.extend(novel.iter().map(|c| **c));

            let remaining_needed = min_per_stratum.saturating_sub(novel.len());
            if remaining_needed > 0 && !non_novel.is_empty() {
                let count = remaining_needed.min(non_novel.len());
                let mut pool: Vec<&Closure> = non_novel.iter().map(|c| **c).collect();
                pool.shuffle(&mut rng);
                sample.extend(pool.into_iter().take(count));
            }
        }

        sample
    }

    /// Convenience wrapper using [`MIN_SAMPLE_PER_STRATUM`].
    pub fn select_default_sample<'a>(
        &self,
        closures: &'a [Closure],
        now: DateTime<Utc>,
    ) -> Vec<&'a Closure> {
        let strata = self.compute_strata(closures);
        self.select_sample(&strata, now, MIN_SAMPLE_PER_STRATUM)
    }
}

/// A later escalation of an alert, used to cross-check prior
/// auto-closures for missed false positives (i.e. false negatives in
/// the auto-closure decision).
#[derive(Debug, Clone)]
pub struct Escalation {
    pub alert_id: String,
}

/// A closure flagged as a likely false negative pending review.
#[derive(Debug, Clone)]
pub struct FlaggedClosure {
    pub alert_id: String,
    pub flagged_at: DateTime<Utc>,
}

/// Cross-references auto-closed alerts against later escalations from
/// other sources.
#[derive(Debug, Default)]
pub struct DailyFNDetector;

impl DailyFNDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn check_auto_closed_escalated(
        &self,
        closures: &[Closure],
        escalations: &[Escalation],
        now: DateTime<Utc>,
    ) -> Vec<FlaggedClosure> {
        let escalated_ids: std::collections::HashSet<&str> =
            escalations.iter().map(|e| e.alert_id.as_str()).collect();

        closures
            .iter()
            .filter(|c| escalated_ids.contains(c.alert_id.as_str()))
            .map(|c| FlaggedClosure {
                alert_id: c.alert_id.clone(),
                flagged_at: now,
            })
            .collect()
    }
}

/// Ties FP-evaluation results back to the auto-closure autonomy
/// threshold: precision or FNR targets missed raise the threshold.
#[derive(Debug, Default)]
pub struct AutonomyGuard;

impl AutonomyGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn should_reduce_autonomy(&self, evaluation: &FPEvaluationResult) -> bool {
        evaluation.precision < PRECISION_TARGET || evaluation.fnr > FNR_CEILING
    }

    /// Raises `current_threshold` by 0.02 per violated target, capped
    /// at 0.99. Returns `current_threshold` unchanged if no target is
    /// violated.
    pub fn get_adjusted_threshold(&self, current_threshold: f64, evaluation: &FPEvaluationResult) -> f64 {
        if !self.should_reduce_autonomy(evaluation) {
            return current_threshold;
        }

        let mut adjustment = 0.0;
        if evaluation.precision < PRECISION_TARGET {
            adjustment += 0.02;
        }
        if evaluation.fnr > FNR_CEILING {
            adjustment += 0.02;
        }
        (current_threshold + adjustment).min(0.99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn closure(pattern_age_days: i64, rule_family: &str) -> Closure {
        Closure {
            alert_id: "a1".to_string(),
            rule_family: rule_family.to_string(),
            severity: "high".to_string(),
            asset_criticality: "crown_jewel".to_string(),
            pattern_id: "p1".to_string(),
            pattern_created_at: Utc::now() - Duration::days(pattern_age_days),
            was_false_positive: true,
        }
    }

    #[test]
    fn compute_metrics_defaults_on_empty_denominators() {
        let mut result = FPEvaluationResult::new("login_brute_force");
        result.compute_metrics();
        assert_eq!(result.precision, 1.0);
        assert_eq!(result.recall, 1.0);
        assert_eq!(result.fnr, 0.0);
    }

    #[test]
    fn compute_metrics_matches_raw_counts() {
        let mut result = FPEvaluationResult::new("login_brute_force");
        result.true_positives = 98;
        result.false_positives = 2;
        result.false_negatives = 1;
        result.compute_metrics();
        assert!((result.precision - 0.98).abs() < 1e-9);
        assert!((result.fnr - (1.0 / 99.0)).abs() < 1e-9);
    }

    #[test]
    fn novel_patterns_are_always_sampled() {
        let now = Utc::now();
        let closures = vec![closure(1, "login_brute_force"); 50];
        let framework = FPEvaluationFramework::new();
        let strata = framework.compute_strata(&closures);
        let sample = framework.select_sample(&strata, now, MIN_SAMPLE_PER_STRATUM);
        assert_eq!(sample.len(), 50);
    }

    #[test]
    fn stale_patterns_top_up_to_minimum_per_stratum() {
        let now = Utc::now();
        let closures = vec![closure(365, "login_brute_force"); 100];
        let framework = FPEvaluationFramework::new();
        let strata = framework.compute_strata(&closures);
        let sample = framework.select_sample(&strata, now, MIN_SAMPLE_PER_STRATUM);
        assert_eq!(sample.len(), MIN_SAMPLE_PER_STRATUM);
    }

    #[test]
    fn fn_detector_flags_auto_closed_alerts_later_escalated() {
        let closures = vec![closure(1, "login_brute_force")];
        let escalations = vec![Escalation {
            alert_id: "a1".to_string(),
        }];
        let detector = DailyFNDetector::new();
        let flagged = detector.check_auto_closed_escalated(&closures, &escalations, Utc::now());
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].alert_id, "a1");
    }

    #[test]
    fn guard_reduces_autonomy_below_precision_target() {
        let mut eval = FPEvaluationResult::new("login_brute_force");
        eval.true_positives = 90;
        eval.false_positives = 10;
        eval.compute_metrics();

        let guard = AutonomyGuard::new();
        assert!(guard.should_reduce_autonomy(&eval));
        assert_eq!(guard.get_adjusted_threshold(0.90, &eval), 0.92);
    }

    #[test]
    fn guard_caps_adjusted_threshold_at_0_99() {
        let mut eval = FPEvaluationResult::new("login_brute_force");
        eval.true_positives = 1;
        eval.false_positives = 99;
        eval.false_negatives = 10;
        eval.compute_metrics();

        let guard = AutonomyGuard::new();
        assert_eq!(guard.get_adjusted_threshold(0.98, &eval), 0.99);
    }

    #[test]
    fn guard_leaves_threshold_unchanged_when_targets_met() {
        let mut eval = FPEvaluationResult::new("login_brute_force");
        eval.true_positives = 100;
        eval.compute_metrics();

        let guard = AutonomyGuard::new();
        assert_eq!(guard.get_adjusted_threshold(0.90, &eval), 0.90);
    }
}
