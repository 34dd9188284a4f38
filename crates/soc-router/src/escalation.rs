//! Escalation manager: decides whether a low-confidence result on a
//! severe alert should be re-analyzed at a higher tier, within an
//! hourly budget.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use soc_core::Severity;

const CONFIDENCE_THRESHOLD: f64 = 0.6;
const MAX_ESCALATIONS_PER_HOUR: usize = 10;
const EXTENDED_THINKING_BUDGET: u32 = 8192;
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub confidence_threshold: f64,
    pub max_escalations_per_hour: usize,
    pub extended_thinking_budget: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            max_escalations_per_hour: MAX_ESCALATIONS_PER_HOUR,
            extended_thinking_budget: EXTENDED_THINKING_BUDGET,
        }
    }
}

fn applicable(severity: Severity) -> bool {
    matches!(severity, Severity::Critical | Severity::High)
}

/// Tracks escalations performed in the trailing hour and decides
/// whether a new one is allowed.
#[derive(Debug)]
pub struct EscalationManager {
    policy: EscalationPolicy,
    timestamps: VecDeque<Instant>,
}

impl EscalationManager {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self {
            policy,
            timestamps: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) >= HOUR {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn escalations_this_hour(&mut self) -> usize {
        self.prune(Instant::now());
        self.timestamps.len()
    }

    pub fn budget_remaining(&mut self) -> usize {
        self.policy
            .max_escalations_per_hour
            .saturating_sub(self.escalations_this_hour())
    }

    /// Returns whether `confidence` on `severity` should trigger
    /// re-analysis at the escalation tier. Does not consume budget;
    /// call [`record_escalation`](Self::record_escalation) once the
    /// escalation actually happens.
    pub fn should_escalate(&mut self, confidence: f64, severity: Severity) -> bool {
        if confidence >= self.policy.confidence_threshold {
            return false;
        }
        if !applicable(severity) {
            return false;
        }
        if self.escalations_this_hour() >= self.policy.max_escalations_per_hour {
            tracing::warn!(
                count = self.timestamps.len(),
                limit = self.policy.max_escalations_per_hour,
                "escalation budget exhausted this hour"
            );
            return false;
        }
        true
    }

    pub fn record_escalation(&mut self) {
        self.timestamps.push_back(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_on_critical_should_escalate() {
        let mut mgr = EscalationManager::new(EscalationPolicy::default());
        assert!(mgr.should_escalate(0.3, Severity::Critical));
    }

    #[test]
    fn high_confidence_does_not_escalate() {
        let mut mgr = EscalationManager::new(EscalationPolicy::default());
        assert!(!mgr.should_escalate(0.9, Severity::Critical));
    }

    #[test]
    fn low_severity_does_not_escalate_even_at_low_confidence() {
        let mut mgr = EscalationManager::new(EscalationPolicy::default());
        assert!(!mgr.should_escalate(0.1, Severity::Medium));
    }

    #[test]
    fn budget_exhausts_after_ten_escalations_in_the_hour() {
        let mut mgr = EscalationManager::new(EscalationPolicy::default());
        for _ in 0..10 {
            assert!(mgr.should_escalate(0.1, Severity::High));
            mgr.record_escalation();
        }
        assert!(!mgr.should_escalate(0.1, Severity::High));
        assert_eq!(mgr.budget_remaining(), 0);
    }
}
