//! Mock LLM provider for tests that exercise routing and resilience
//! logic without making real provider calls.

use async_trait::async_trait;
use std::time::Instant;

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug)]
pub struct MockProvider {
    pub name: String,
    responses: Vec<String>,
    index: std::sync::atomic::AtomicUsize,
    latency_ms: u64,
    available: std::sync::atomic::AtomicBool,
}

impl MockProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            index: std::sync::atomic::AtomicUsize::new(0),
            latency_ms: 50,
            available: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Responds with a canned triage classification regardless of the
    /// prompt, for tests that only care about routing/dispatch, not
    /// content.
    pub fn classifier() -> Self {
        Self::new(vec![
            "{\"classification\":\"suspicious\",\"confidence\":0.82}".to_string(),
        ])
    }

    pub fn named(name: &str, response: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: vec![response.to_string()],
            index: std::sync::atomic::AtomicUsize::new(0),
            latency_ms: 50,
            available: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, std::sync::atomic::Ordering::Relaxed);
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available.load(std::sync::atomic::Ordering::Relaxed)
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        if !self.is_available().await {
            return Err(LlmError::NotAvailable);
        }

        let start = Instant::now();
        tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;

        let idx = self.index.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let content = self.responses[idx % self.responses.len()].clone();

        Ok(LlmResponse {
            content,
            model: self.name.clone(),
            tokens_used: Some((request.prompt.len() / 4) as u32 + 100),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl crate::provider::EmbeddingProvider for MockProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(vec![0.0; 1536])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn constant_mock_echoes_canned_response() {
        let mock = MockProvider::constant("triage complete");
        let response = mock.ask("test").await.unwrap();
        assert_eq!(response, "triage complete");
    }

    #[tokio::test]
    async fn unavailable_mock_errors() {
        let mock = MockProvider::constant("unused");
        mock.set_available(false);
        assert!(mock.ask("test").await.is_err());
    }
}
