//! OpenAI-compatible chat-completions client.
//!
//! Works with any OpenAI-compatible endpoint (OpenAI, Groq, proxies).

use crate::error::{BenchError, Result};
use crate::llm::provider::{EndpointConfig, LlmClient, LlmReply, map_transport_error, require_key};
use crate::llm::retry::{Attempt, RetryConfig, send_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// API error response body.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible LLM client.
pub struct OpenAiCompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl OpenAiCompatClient {
    /// Create a client from endpoint configuration.
    ///
    /// The credential is resolved now but only checked at the first
    /// `generate` call.
    pub fn new(config: &EndpointConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        let retry = RetryConfig {
            max_retries: config.max_retries.unwrap_or(3),
            base_delay_ms: config.base_delay_ms.unwrap_or(1_000),
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

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    /// Send one chat-completion request.
    async fn attempt(&self, prompt: &str) -> Result<Attempt> {
        let key = require_key(&self.api_key, &format!("{}/{}", PROVIDER, self.model))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&request)
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
                message: error_message(&body),
            });
        }
        if status.is_server_error() {
            return Err(BenchError::ServerError {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        if !status.is_success() {
            return Err(BenchError::Api {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let completion: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| BenchError::MalformedResponse {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            BenchError::MalformedResponse {
                provider: PROVIDER.to_string(),
                message: "empty 'choices' array in response".to_string(),
            }
        })?;

        Ok(Attempt {
            text: choice.message.content,
            http_status: status.as_u16(),
        })
    }
}

/// Pull the human-readable message out of an API error body, falling back
/// to the raw (truncated) body.
fn error_message(body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return api_error.error.message;
    }
    body.chars().take(200).collect()
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
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
