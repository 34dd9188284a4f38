//! Environment-driven configuration for LLM provider credentials and
//! resilience defaults.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Primary provider API key (env: SOC_LLM_PRIMARY_API_KEY)
    pub primary_api_key: Option<String>,
    /// Secondary/fallback provider API key (env: SOC_LLM_SECONDARY_API_KEY)
    pub secondary_api_key: Option<String>,
    pub default_provider: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary_api_key: None,
            secondary_api_key: None,
            default_provider: "openai".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            primary_api_key: env::var("SOC_LLM_PRIMARY_API_KEY").ok(),
            secondary_api_key: env::var("SOC_LLM_SECONDARY_API_KEY").ok(),
            default_provider: env::var("SOC_LLM_DEFAULT_PROVIDER")
                .unwrap_or_else(|_| "openai".to_string()),
        }
    }

    pub fn is_configured(&self, provider: &str) -> bool {
        match provider.to_lowercase().as_str() {
            "openai" => self.primary_api_key.is_some(),
            "deepseek" => self.secondary_api_key.is_some(),
            "mock" => true,
            _ => false,
        }
    }

    pub fn available_providers(&self) -> Vec<&str> {
        let mut providers = vec!["mock"];
        if self.primary_api_key.is_some() {
            providers.push("openai");
        }
        if self.secondary_api_key.is_some() {
            providers.push("deepseek");
        }
        providers
    }
}

/// Runtime knobs for the resilience layer that aren't per-provider.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub circuit_failure_threshold: u32,
    pub circuit_recovery_timeout_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_failure_threshold: 5,
            circuit_recovery_timeout_secs: 30,
        }
    }
}

impl ResilienceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            circuit_failure_threshold: env::var("SOC_LLM_CIRCUIT_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.circuit_failure_threshold),
            circuit_recovery_timeout_secs: env::var("SOC_LLM_CIRCUIT_RECOVERY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.circuit_recovery_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_only_has_mock_available() {
        let config = LlmConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert!(config.is_configured("mock"));
        assert!(!config.is_configured("openai"));
    }

    #[test]
    fn available_providers_grows_with_keys() {
        let mut config = LlmConfig::default();
        config.primary_api_key = Some("key".to_string());
        assert!(config.available_providers().contains(&"openai"));
    }
}
