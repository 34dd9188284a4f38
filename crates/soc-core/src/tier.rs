//! Model tiers and their static capability registry.

use serde::{Deserialize, Serialize};

/// The four-tier model architecture the router selects across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Fast, cheap triage model.
    Tier0,
    /// Deep-reasoning general-purpose model.
    Tier1,
    /// Complex-reasoning / escalation model.
    Tier1Plus,
    /// Offline batch-eligible variant, priced and queued separately
    /// from the synchronous tiers.
    Tier2,
}

/// Per-tier capability and pricing profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,
    pub max_context_tokens: u32,
    pub cost_per_mtok_input: f64,
    pub cost_per_mtok_output: f64,
    pub supports_extended_thinking: bool,
    pub supports_tool_use: bool,
    pub supports_prompt_caching: bool,
    pub batch_eligible: bool,
}

impl ModelTier {
    /// Static per-tier defaults. Mirrors the registry a deployment would
    /// normally load from configuration; kept inline here since tier
    /// capabilities are a platform invariant, not environment-specific.
    pub fn config(self) -> ModelConfig {
        match self {
            ModelTier::Tier0 => ModelConfig {
                provider: "deepseek".to_string(),
                model_id: "fast-triage-v1".to_string(),
                max_context_tokens: 200_000,
                cost_per_mtok_input: 0.80,
                cost_per_mtok_output: 4.0,
                supports_extended_thinking: false,
                supports_tool_use: true,
                supports_prompt_caching: true,
                batch_eligible: false,
            },
            ModelTier::Tier1 => ModelConfig {
                provider: "openai".to_string(),
                model_id: "deep-reasoning-v1".to_string(),
                max_context_tokens: 200_000,
                cost_per_mtok_input: 3.0,
                cost_per_mtok_output: 15.0,
                supports_extended_thinking: false,
                supports_tool_use: true,
                supports_prompt_caching: true,
                batch_eligible: false,
            },
            ModelTier::Tier1Plus => ModelConfig {
                provider: "openai".to_string(),
                model_id: "escalation-reasoning-v1".to_string(),
                max_context_tokens: 200_000,
                cost_per_mtok_input: 15.0,
                cost_per_mtok_output: 75.0,
                supports_extended_thinking: true,
                supports_tool_use: true,
                supports_prompt_caching: true,
                batch_eligible: false,
            },
            ModelTier::Tier2 => ModelConfig {
                provider: "deepseek".to_string(),
                model_id: "batch-reasoning-v1".to_string(),
                max_context_tokens: 200_000,
                cost_per_mtok_input: 1.5,
                cost_per_mtok_output: 7.5,
                supports_extended_thinking: false,
                supports_tool_use: true,
                supports_prompt_caching: true,
                batch_eligible: true,
            },
        }
    }

    /// Default generation parameters for this tier.
    pub fn defaults(self) -> (u32, f64) {
        match self {
            ModelTier::Tier0 => (2048, 0.1),
            ModelTier::Tier1 => (8192, 0.2),
            ModelTier::Tier1Plus => (16384, 0.2),
            ModelTier::Tier2 => (16384, 0.3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier1_plus_is_the_only_extended_thinking_tier() {
        for tier in [
            ModelTier::Tier0,
            ModelTier::Tier1,
            ModelTier::Tier1Plus,
            ModelTier::Tier2,
        ] {
            let supports = tier.config().supports_extended_thinking;
            assert_eq!(supports, tier == ModelTier::Tier1Plus);
        }
    }

    #[test]
    fn only_tier2_is_batch_eligible() {
        assert!(ModelTier::Tier2.config().batch_eligible);
        assert!(!ModelTier::Tier0.config().batch_eligible);
        assert!(!ModelTier::Tier1.config().batch_eligible);
        assert!(!ModelTier::Tier1Plus.config().batch_eligible);
    }
}
