//! Integration tests that require a real LLM API.
//!
//! Run with: cargo test -p soc-llm --test llm_integration -- --ignored

use soc_llm::{DeepSeekProvider, LlmProvider, LlmRequest, MockProvider, OpenAIProvider};

#[tokio::test]
#[ignore = "Requires DEEPSEEK_API_KEY"]
async fn deepseek_real_request() {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .expect("DEEPSEEK_API_KEY must be set for this test");

    let provider = DeepSeekProvider::chat(&api_key);
    assert!(provider.is_available().await, "DeepSeek should be available");

    let request = LlmRequest {
        tenant_id: None,
        prompt: "What is 2 + 2? Answer with just the number.".to_string(),
        system: "You are a helpful assistant. Be extremely concise.".to_string(),
        temperature: 0.0,
        max_tokens: 10,
    };

    let response = provider.complete(request).await.expect("request should succeed");
    assert!(!response.content.is_empty());
    assert!(response.content.contains('4'));
}

#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY"]
async fn openai_real_request() {
    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set for this test");

    let provider = OpenAIProvider::gpt35(&api_key);
    assert!(provider.is_available().await, "OpenAI should be available");

    let content = provider.ask("Say 'hello' in one word").await.expect("request should succeed");
    assert!(!content.is_empty());
}

#[tokio::test]
#[ignore = "Makes real API call"]
async fn invalid_api_key_fails() {
    let provider = DeepSeekProvider::chat("invalid-key-12345");
    assert!(provider.ask("Hello").await.is_err());
}

#[tokio::test]
async fn mock_provider_roundtrips_without_network() {
    let mock = MockProvider::classifier();
    let response = mock.ask("classify this alert").await.unwrap();
    assert!(response.contains("classification"));
}
