//! Wraps an `LlmProvider` with circuit breaker protection, recording
//! every dispatch outcome against a shared [`CircuitBreaker`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::circuit::{CircuitBreaker, CircuitConfig};
use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug)]
pub struct ResilientProvider<P: LlmProvider> {
    inner: Arc<P>,
    breaker: Arc<CircuitBreaker>,
}

impl<P: LlmProvider> ResilientProvider<P> {
    pub fn new(provider: P, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner: Arc::new(provider),
            breaker,
        }
    }

    pub fn wrap(provider: P) -> Self {
        Self::new(provider, Arc::new(CircuitBreaker::new(CircuitConfig::default())))
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl<P: LlmProvider + 'static> LlmProvider for ResilientProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.breaker.allow_request().await.is_ok() && self.inner.is_available().await
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.breaker.allow_request().await.map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        match self.inner.complete(request).await {
            Ok(response) => {
                self.breaker.record_success().await;
                Ok(response)
            }
            Err(err) => {
                match &err {
                    LlmError::ConnectionFailed(_) | LlmError::NotAvailable | LlmError::RateLimited => {
                        self.breaker.record_failure().await;
                    }
                    _ => {}
                }
                Err(err)
            }
        }
    }
}
