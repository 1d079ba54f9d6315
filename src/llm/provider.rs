//! Provider set, endpoint configuration, and the uniform client trait.

use crate::error::{BenchError, Result};
use crate::llm::{GeminiClient, OpenAiCompatClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Supported LLM providers.
///
/// A closed enum: an unsupported provider is a deserialization error, not
/// a runtime string-match failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat-completions APIs (OpenAI, Groq, proxies).
    Openai,
    /// Google Gemini generateContent API.
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Gemini => "gemini",
        }
    }
}

/// One (provider, model) pair bound to its transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Which wire protocol to speak.
    pub provider: Provider,

    /// Model name (e.g. "llama-3.1-8b-instant", "gemini-1.5-flash").
    pub model: String,

    /// Base URL override; each provider has a sensible default.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Explicit API key. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable to read the API key from.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Total attempts before a transient failure becomes final.
    /// Provider defaults apply when unset.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Base backoff delay in milliseconds. Provider defaults apply when
    /// unset.
    #[serde(default)]
    pub base_delay_ms: Option<u64>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Response token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

impl EndpointConfig {
    /// Resolve the API key: explicit value first, then the named
    /// environment variable. `None` means the credential is missing; the
    /// client reports that at first use.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }

    /// Identifier used in logs and error messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider.as_str(), self.model)
    }
}

/// The model text plus per-call metadata.
#[derive(Debug, Clone)]
pub struct LlmReply {
    /// Generated content.
    pub text: String,
    /// Status of the final HTTP response.
    pub http_status: u16,
    /// Retries performed before this reply (0 = first attempt succeeded).
    pub retry_count: u32,
    /// Whether any attempt was rejected with HTTP 429.
    pub rate_limited: bool,
}

/// Uniform generation interface over providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<LlmReply>;

    /// Provider identifier ("openai", "gemini").
    fn provider(&self) -> &'static str;

    /// Model name.
    fn model(&self) -> &str;

    /// Total attempt budget for transient failures.
    fn max_retries(&self) -> u32;
}

/// Construct the client for an endpoint.
///
/// Construction never fails: a missing credential surfaces as
/// [`BenchError::CredentialMissing`] on the first `generate` call so it can
/// be recorded as a failed evaluation rather than crash the batch.
pub fn build_client(config: &EndpointConfig) -> Box<dyn LlmClient> {
    match config.provider {
        Provider::Openai => Box::new(OpenAiCompatClient::new(config)),
        Provider::Gemini => Box::new(GeminiClient::new(config)),
    }
}

/// Shared credential check used by the clients.
pub(super) fn require_key(key: &Option<String>, label: &str) -> Result<String> {
    key.clone()
        .ok_or_else(|| BenchError::CredentialMissing(label.to_string()))
}

/// Map a reqwest transport error into the crate taxonomy.
pub(super) fn map_transport_error(provider: &str, err: reqwest::Error) -> BenchError {
    if err.is_timeout() {
        BenchError::Timeout {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else {
        BenchError::Network {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}
