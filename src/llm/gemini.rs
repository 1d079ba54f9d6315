//! Google Gemini generateContent client.
//!
//! Differences from OpenAI-compatible APIs: auth rides in a `?key=` query
//! parameter, the prompt goes in `contents`/`parts`, and the reply comes
//! back under a `candidates` array.

use crate::error::{BenchError, Result};
use crate::llm::provider::{EndpointConfig, LlmClient, LlmReply, map_transport_error, require_key};
use crate::llm::retry::{Attempt, RetryConfig, send_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const PROVIDER: &str = "gemini";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Google Gemini LLM client.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl GeminiClient {
    /// Create a client from endpoint configuration.
    ///
    /// Gemini free-tier quotas are tight, so the default retry budget is
    /// larger and the base delay longer than the OpenAI-compatible client.
    pub fn new(config: &EndpointConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        let retry = RetryConfig {
            max_retries: config.max_retries.unwrap_or(5),
            base_delay_ms: config.base_delay_ms.unwrap_or(2_000),
            ..RetryConfig::default()
        };

        Self {
            client,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: config.resolve_api_key(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry,
        }
    }

    /// Get the generateContent URL for this model, without the key.
    fn endpoint(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/models/{}:generateContent", base, self.model)
    }

    fn build_request_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}],
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        })
    }

    /// Send one generateContent request.
    async fn attempt(&self, prompt: &str) -> Result<Attempt> {
        let key = require_key(&self.api_key, &format!("{}/{}", PROVIDER, self.model))?;

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", key.as_str())])
            .header("Content-Type", "application/json")
            .json(&self.build_request_body(prompt))
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(PROVIDER, e))?;

        if status.as_u16() == 429 {
            return Err(BenchError::RateLimited {
                provider: PROVIDER.to_string(),
                message: truncate(&body),
            });
        }
        if status.is_server_error() {
            return Err(BenchError::ServerError {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: truncate(&body),
            });
        }
        if !status.is_success() {
            return Err(BenchError::Api {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        let text = parse_candidates(&body)?;
        Ok(Attempt {
            text,
            http_status: status.as_u16(),
        })
    }
}

/// Extract the reply text from a generateContent body.
///
/// Validates the nested shape and never returns a partially-parsed string.
fn parse_candidates(body: &str) -> Result<String> {
    let malformed = |message: String| BenchError::MalformedResponse {
        provider: PROVIDER.to_string(),
        message,
    };

    let value: Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let candidates = value["candidates"]
        .as_array()
        .ok_or_else(|| malformed("missing 'candidates' array in response".to_string()))?;

    let candidate = candidates
        .first()
        .ok_or_else(|| malformed("empty 'candidates' array in response".to_string()))?;

    let parts = candidate["content"]["parts"]
        .as_array()
        .ok_or_else(|| malformed("missing 'parts' array in candidate content".to_string()))?;

    let texts: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if texts.is_empty() {
        return Err(malformed("no text part in candidate content".to_string()));
    }

    Ok(texts.join(""))
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<LlmReply> {
        send_with_retry(PROVIDER, &self.retry, || self.attempt(prompt)).await
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    fn config() -> EndpointConfig {
        EndpointConfig {
            provider: Provider::Gemini,
            model: "gemini-1.5-flash".to_string(),
            api_base: None,
            api_key: Some("test".to_string()),
            api_key_env: None,
            max_retries: None,
            base_delay_ms: None,
            timeout_secs: 60,
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[test]
    fn test_endpoint_construction() {
        let client = GeminiClient::new(&config());
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_default_retry_budget_is_larger() {
        let client = GeminiClient::new(&config());
        assert_eq!(client.max_retries(), 5);
        assert_eq!(client.retry.base_delay_ms, 2_000);
    }

    #[test]
    fn test_parse_candidates() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Revenue "}, {"text": "grew."}], "role": "model"},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(parse_candidates(body).unwrap(), "Revenue grew.");
    }

    #[test]
    fn test_parse_rejects_missing_candidates() {
        let err = parse_candidates(r#"{"promptFeedback": {}}"#).unwrap_err();
        assert!(matches!(err, BenchError::MalformedResponse { .. }));

        let err = parse_candidates(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, BenchError::MalformedResponse { .. }));

        let err =
            parse_candidates(r#"{"candidates": [{"content": {"parts": []}}]}"#).unwrap_err();
        assert!(matches!(err, BenchError::MalformedResponse { .. }));
    }

    #[test]
    fn test_request_body_shape() {
        let client = GeminiClient::new(&config());
        let body = client.build_request_body("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    }
}
