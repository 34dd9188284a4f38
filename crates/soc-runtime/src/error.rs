//! Detection runner error types and the retry/fatal split the job
//! queue's worker pool acts on.

use soc_audit::AuditError;
use soc_llm::{LlmError, QuotaExceeded};
use soc_router::RouterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("routing failed: {0}")]
    Routing(#[from] RouterError),
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),
    #[error("no concurrency slot available for priority")]
    ConcurrencyExhausted,
    #[error("llm dispatch failed: {0}")]
    Llm(#[from] LlmError),
    #[error("audit write failed: {0}")]
    Audit(#[from] AuditError),
}

impl RunnerError {
    /// Whether the worker pool should retry the job with backoff, as
    /// opposed to dead-lettering it immediately. Quota exhaustion and a
    /// momentarily full concurrency pool are transient; a routing
    /// failure (no capable model for the task) or an audit write
    /// failure (chain integrity at risk) are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunnerError::QuotaExceeded(_) | RunnerError::ConcurrencyExhausted | RunnerError::Llm(_)
        )
    }
}
