//! # soc-llm
//!
//! LLM provider abstraction and resilience layer: the `LlmProvider`
//! trait, circuit breakers with lazy half-open promotion, a
//! provider-health registry that derives the platform's degradation
//! level, and priority/tenant concurrency control.
//!
//! ## Quick Start
//!
//! ```rust
//! use soc_llm::{MockProvider, LlmProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = MockProvider::classifier();
//!     let response = provider.ask("classify this alert").await.unwrap();
//!     println!("{response}");
//! }
//! ```

pub mod circuit;
pub mod concurrency;
pub mod config;
pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod resilient_provider;

pub use circuit::{
    CircuitBreaker, CircuitConfig, CircuitError, CircuitState, DegradationLevel,
    ProviderHealthRegistry,
};
pub use concurrency::{ConcurrencyController, Priority, QuotaExceeded, TenantQuota, TenantTier};
pub use config::{ConfigError, LlmConfig, ResilienceConfig};
pub use deepseek::DeepSeekProvider;
pub use mock::MockProvider;
pub use openai::OpenAIProvider;
pub use provider::{
    EmbeddingProvider, LlmError, LlmProvider, LlmRequest, LlmResponse, MAX_PROMPT_SIZE,
    MAX_SYSTEM_SIZE,
};
pub use resilient_provider::ResilientProvider;
