//! Per-provider circuit breaker and health registry.
//!
//! State promotion from `Open` to `HalfOpen` is derived lazily from
//! elapsed time rather than driven by a background timer: any caller
//! that reads `.state()`, or that calls `record_success`/
//! `record_failure`, re-checks the recovery timeout first and promotes
//! as a side effect. This matters for `record_success`/`record_failure`
//! specifically — a success recorded after the timeout elapses closes
//! the breaker even if nothing ever read `.state()` in between.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("circuit open for provider {0}")]
    Open(String),
}

#[derive(Debug, Clone)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    inner: RwLock<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
        }
    }

    /// Promote `Open` to `HalfOpen` if the recovery timeout has
    /// elapsed. Shared by every entry point so the promotion is never
    /// missed regardless of call order.
    fn recheck(inner: &mut Inner, recovery_timeout: Duration) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                }
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        let mut inner = self.inner.write().await;
        Self::recheck(&mut inner, self.config.recovery_timeout);
        inner.state
    }

    /// `Ok(())` if a request may proceed, `Err` if the circuit is open.
    pub async fn allow_request(&self) -> Result<(), CircuitError> {
        match self.state().await {
            CircuitState::Open => Err(CircuitError::Open("provider".to_string())),
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        Self::recheck(&mut inner, self.config.recovery_timeout);
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        Self::recheck(&mut inner, self.config.recovery_timeout);

        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            return;
        }

        inner.failure_count += 1;
        if inner.failure_count >= self.config.failure_threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationLevel {
    FullCapability,
    SecondaryActive,
    DeterministicOnly,
}

/// Owns one breaker per provider name, auto-creating them on first
/// access, and derives the platform's overall degradation level from
/// the primary/secondary pair's states.
pub struct ProviderHealthRegistry {
    config: CircuitConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ProviderHealthRegistry {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn breaker(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().await.get(provider) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.clone())))
            .clone()
    }

    pub async fn degradation_level(&self, primary: &str, secondary: &str) -> DegradationLevel {
        let primary_up = self.breaker(primary).await.state().await != CircuitState::Open;
        if primary_up {
            return DegradationLevel::FullCapability;
        }
        let secondary_up = self.breaker(secondary).await.state().await != CircuitState::Open;
        if secondary_up {
            DegradationLevel::SecondaryActive
        } else {
            DegradationLevel::DeterministicOnly
        }
    }
}
