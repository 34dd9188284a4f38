//! Router error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no model in tier {0:?} satisfies the required capability {1}")]
    NoCapableModel(soc_core::ModelTier, &'static str),
    #[error("escalation budget exhausted for this hour")]
    EscalationBudgetExhausted,
}
