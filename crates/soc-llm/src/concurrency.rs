//! Priority-based concurrency control and per-tenant hourly quotas.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy)]
struct PriorityLimit {
    max_concurrent: u32,
    max_rpm: u32,
}

impl Priority {
    fn limit(self) -> PriorityLimit {
        match self {
            Priority::Critical => PriorityLimit { max_concurrent: 8, max_rpm: 200 },
            Priority::High => PriorityLimit { max_concurrent: 6, max_rpm: 100 },
            Priority::Normal => PriorityLimit { max_concurrent: 4, max_rpm: 50 },
            Priority::Low => PriorityLimit { max_concurrent: 2, max_rpm: 20 },
        }
    }
}

const RPM_WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct PriorityState {
    active: u32,
    timestamps: VecDeque<Instant>,
}

/// Enforces per-priority concurrency and RPM limits with a sliding
/// 60-second window. `acquire` never blocks or queues — a caller that
/// can't get a slot should requeue the job at the caller's discretion.
pub struct ConcurrencyController {
    state: Mutex<HashMap<Priority, PriorityState>>,
}

impl Default for ConcurrencyController {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrencyController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, priority: Priority) -> bool {
        let limit = priority.limit();
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        let state = guard.entry(priority).or_default();

        while let Some(&front) = state.timestamps.front() {
            if now.duration_since(front) >= RPM_WINDOW {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }

        if state.timestamps.len() as u32 >= limit.max_rpm {
            return false;
        }
        if state.active >= limit.max_concurrent {
            return false;
        }

        state.active += 1;
        state.timestamps.push_back(now);
        true
    }

    pub async fn release(&self, priority: Priority) {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.get_mut(&priority) {
            state.active = state.active.saturating_sub(1);
        }
    }

    pub async fn active(&self, priority: Priority) -> u32 {
        self.state.lock().await.get(&priority).map(|s| s.active).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantTier {
    Premium,
    Standard,
    Trial,
}

impl TenantTier {
    fn hourly_quota(self) -> u32 {
        match self {
            TenantTier::Premium => 500,
            TenantTier::Standard => 100,
            TenantTier::Trial => 20,
        }
    }
}

const QUOTA_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
#[error("tenant {tenant_id} ({tier:?}) exceeded {quota} calls/hour ({used} used)")]
pub struct QuotaExceeded {
    pub tenant_id: String,
    pub tier: TenantTier,
    pub quota: u32,
    pub used: usize,
}

/// Tracks per-tenant call volume over a sliding hourly window.
pub struct TenantQuota {
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for TenantQuota {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantQuota {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = calls.front() {
            if now.duration_since(front) >= QUOTA_WINDOW {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Does not record a call; callers check first, dispatch, then call
    /// `record_tenant_call` only on a successful dispatch.
    pub async fn check_tenant_quota(&self, tenant_id: &str, tier: TenantTier) -> Result<(), QuotaExceeded> {
        let quota = tier.hourly_quota();
        let now = Instant::now();
        let mut guard = self.calls.lock().await;
        let calls = guard.entry(tenant_id.to_string()).or_default();
        Self::prune(calls, now);

        if calls.len() as u32 >= quota {
            return Err(QuotaExceeded {
                tenant_id: tenant_id.to_string(),
                tier,
                quota,
                used: calls.len(),
            });
        }
        Ok(())
    }

    pub async fn record_tenant_call(&self, tenant_id: &str) {
        let now = Instant::now();
        let mut guard = self.calls.lock().await;
        guard.entry(tenant_id.to_string()).or_default().push_back(now);
    }
}
