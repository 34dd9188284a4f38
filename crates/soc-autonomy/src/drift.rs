//! Concept drift detection across alert source mix, technique
//! frequency, and entity-type distributions, and the threshold
//! adjuster that raises the auto-close confidence bar when drift is
//! detected.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

const SOURCE_WEIGHT: f64 = 0.4;
const TECHNIQUE_WEIGHT: f64 = 0.35;
const ENTITY_WEIGHT: f64 = 0.25;
const DEFAULT_DRIFT_THRESHOLD: f64 = 0.3;

pub const NORMAL_THRESHOLD: f64 = 0.90;
pub const ELEVATED_THRESHOLD: f64 = 0.95;

/// Jensen-Shannon divergence (base 2, bounded [0, 1]) between two
/// count distributions keyed by category.
fn js_divergence(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f64 {
    let keys: HashSet<&String> = a.keys().chain(b.keys()).collect();
    if keys.is_empty() {
        return 0.0;
    }

    let total_a = a.values().sum::<u32>().max(1) as f64;
    let total_b = b.values().sum::<u32>().max(1) as f64;

    let p = |k: &str| a.get(k).copied().unwrap_or(0) as f64 / total_a;
    let q = |k: &str| b.get(k).copied().unwrap_or(0) as f64 / total_b;

    let mut kl_pm = 0.0;
    let mut kl_qm = 0.0;
    for key in &keys {
        let pk = p(key);
        let qk = q(key);
        let mk = (pk + qk) / 2.0;
        if pk > 0.0 && mk > 0.0 {
            kl_pm += pk * (pk / mk).log2();
        }
        if qk > 0.0 && mk > 0.0 {
            kl_qm += qk * (qk / mk).log2();
        }
    }

    (0.5 * kl_pm + 0.5 * kl_qm).clamp(0.0, 1.0)
}

/// Snapshot of drift across the three monitored dimensions.
#[derive(Debug, Clone)]
pub struct DriftState {
    pub source_drift: f64,
    pub technique_drift: f64,
    pub entity_drift: f64,
    pub overall_drift: f64,
    pub threshold_exceeded: bool,
    pub detected_at: DateTime<Utc>,
}

/// Detects distribution shifts between a current window and a
/// baseline period across alert source, technique, and entity-type
/// distributions.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    drift_threshold: f64,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self {
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }
}

impl DriftDetector {
    pub fn new(drift_threshold: f64) -> Self {
        Self { drift_threshold }
    }

    pub fn detect(
        &self,
        current_sources: &HashMap<String, u32>,
        baseline_sources: &HashMap<String, u32>,
        current_techniques: &HashMap<String, u32>,
        baseline_techniques: &HashMap<String, u32>,
        current_entities: &HashMap<String, u32>,
        baseline_entities: &HashMap<String, u32>,
        now: DateTime<Utc>,
    ) -> DriftState {
        let source = js_divergence(current_sources, baseline_sources);
        let technique = js_divergence(current_techniques, baseline_techniques);
        let entity = js_divergence(current_entities, baseline_entities);
        let overall = SOURCE_WEIGHT * source + TECHNIQUE_WEIGHT * technique + ENTITY_WEIGHT * entity;

        DriftState {
            source_drift: source,
            technique_drift: technique,
            entity_drift: entity,
            overall_drift: overall,
            threshold_exceeded: overall > self.drift_threshold,
            detected_at: now,
        }
    }
}

/// Maps a [`DriftState`] to the effective auto-close confidence
/// threshold: normal when no drift is detected, elevated while it is.
#[derive(Debug, Clone)]
pub struct ThresholdAdjuster {
    normal: f64,
    elevated: f64,
    current: Option<DriftState>,
}

impl Default for ThresholdAdjuster {
    fn default() -> Self {
        Self {
            normal: NORMAL_THRESHOLD,
            elevated: ELEVATED_THRESHOLD,
            current: None,
        }
    }
}

impl ThresholdAdjuster {
    pub fn new(normal: f64, elevated: f64) -> Self {
        Self {
            normal,
            elevated,
            current: None,
        }
    }

    pub fn update(&mut self, state: DriftState) {
        self.current = Some(state);
    }

    pub fn get_threshold(&self, state: Option<&DriftState>) -> f64 {
        let state = state.or(self.current.as_ref());
        match state {
            Some(s) if s.threshold_exceeded => self.elevated,
            _ => self.normal,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.threshold_exceeded)
    }
}

/// Composes a drift-driven threshold with an independently elevated
/// threshold (e.g. from the router's escalation policy) by taking the
/// maximum of the two, never summing them.
pub fn effective_threshold(drift_threshold: f64, other_threshold: f64) -> f64 {
    drift_threshold.max(other_threshold)
}

/// Doubles the FP-evaluation sampling multiplier for rule families
/// affected by detected drift, until drift subsides.
#[derive(Debug, Default)]
pub struct DriftSamplingCallback {
    multiplier: f64,
    elevated_families: HashSet<String>,
}

impl DriftSamplingCallback {
    pub fn new() -> Self {
        Self {
            multiplier: 1.0,
            elevated_families: HashSet::new(),
        }
    }

    pub fn on_drift_detected(&mut self, rule_families: &[String]) {
        self.elevated_families.extend(rule_families.iter().cloned());
        self.multiplier = 2.0;
    }

    pub fn on_drift_restored(&mut self) {
        self.elevated_families.clear();
        self.multiplier = 1.0;
    }

    pub fn get_sample_multiplier(&self, rule_family: Option<&str>) -> f64 {
        if self.elevated_families.is_empty() {
            return 1.0;
        }
        match rule_family {
            Some(family) if !self.elevated_families.contains(family) => 1.0,
            _ => self.multiplier,
        }
    }

    pub fn elevated_families(&self) -> &HashSet<String> {
        &self.elevated_families
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn identical_distributions_have_zero_divergence() {
        let a = dist(&[("siem", 100), ("edr", 50)]);
        assert_eq!(js_divergence(&a, &a), 0.0);
    }

    #[test]
    fn disjoint_distributions_approach_max_divergence() {
        let a = dist(&[("siem", 100)]);
        let b = dist(&[("edr", 100)]);
        assert!(js_divergence(&a, &b) > 0.9);
    }

    #[test]
    fn overall_drift_weights_source_heaviest() {
        let detector = DriftDetector::default();
        let baseline = dist(&[("siem", 100)]);
        let shifted = dist(&[("edr", 100)]);
        let empty = dist(&[]);

        let state = detector.detect(&shifted, &baseline, &empty, &empty, &empty, &empty, Utc::now());
        assert!((state.overall_drift - SOURCE_WEIGHT * state.source_drift).abs() < 1e-9);
        assert!(state.threshold_exceeded);
    }

    #[test]
    fn threshold_adjuster_elevates_on_drift() {
        let mut adjuster = ThresholdAdjuster::default();
        assert_eq!(adjuster.get_threshold(None), NORMAL_THRESHOLD);

        adjuster.update(DriftState {
            source_drift: 1.0,
            technique_drift: 0.0,
            entity_drift: 0.0,
            overall_drift: 0.5,
            threshold_exceeded: true,
            detected_at: Utc::now(),
        });
        assert_eq!(adjuster.get_threshold(None), ELEVATED_THRESHOLD);
        assert!(adjuster.is_elevated());
    }

    #[test]
    fn elevated_threshold_wins_over_normal() {
        assert_eq!(effective_threshold(ELEVATED_THRESHOLD, NORMAL_THRESHOLD), ELEVATED_THRESHOLD);
        assert_eq!(effective_threshold(NORMAL_THRESHOLD, NORMAL_THRESHOLD), NORMAL_THRESHOLD);
    }

    #[test]
    fn sampling_callback_doubles_multiplier_for_affected_families_only() {
        let mut cb = DriftSamplingCallback::new();
        cb.on_drift_detected(&["login_brute_force".to_string()]);
        assert_eq!(cb.get_sample_multiplier(Some("login_brute_force")), 2.0);
        assert_eq!(cb.get_sample_multiplier(Some("dns_tunneling")), 1.0);

        cb.on_drift_restored();
        assert_eq!(cb.get_sample_multiplier(Some("login_brute_force")), 1.0);
    }
}
