//! Environment-driven configuration for the detection runner's worker
//! pool, retention scheduling, and drift monitoring, following the same
//! `Default` + `from_env()` pattern as `soc_llm::config`.

use std::env;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Worker pool sizing. Mirrors [`soc_queue::worker::WorkerConfig`] but
/// lives here so it can be tuned independently of the queue crate's own
/// defaults, which are meant for generic job processing.
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub worker_max_concurrency: usize,
    pub worker_poll_interval_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            worker_max_concurrency: 16,
            worker_poll_interval_ms: 100,
        }
    }
}

impl ConcurrencyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_max_concurrency: env_parse("SOC_RUNTIME_WORKER_CONCURRENCY", defaults.worker_max_concurrency),
            worker_poll_interval_ms: env_parse("SOC_RUNTIME_POLL_INTERVAL_MS", defaults.worker_poll_interval_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }
}

/// Scheduling cadence for the warm-to-cold retention lifecycle jobs.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub check_interval_hours: u64,
    pub generated_by: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: 24,
            generated_by: "retention-scheduler".to_string(),
        }
    }
}

impl RetentionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            check_interval_hours: env_parse("SOC_RETENTION_CHECK_INTERVAL_HOURS", defaults.check_interval_hours),
            generated_by: env::var("SOC_RETENTION_GENERATED_BY").unwrap_or(defaults.generated_by),
        }
    }
}

/// Threshold and cadence for the concept-drift detector.
#[derive(Debug, Clone)]
pub struct DriftConfig {
    pub drift_threshold: f64,
    pub check_interval_hours: u64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.3,
            check_interval_hours: 1,
        }
    }
}

impl DriftConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            drift_threshold: env_parse("SOC_DRIFT_THRESHOLD", defaults.drift_threshold),
            check_interval_hours: env_parse("SOC_DRIFT_CHECK_INTERVAL_HOURS", defaults.check_interval_hours),
        }
    }
}
