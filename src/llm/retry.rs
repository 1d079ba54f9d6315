//! Shared retry loop for provider clients.
//!
//! Retryable: HTTP 429, 5xx, timeouts, and transport failures. Everything
//! else (4xx, malformed bodies, missing credentials) fails on the spot.

use crate::error::{BenchError, Result};
use crate::llm::LlmReply;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy for one endpoint.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `base * 2^n` plus jitter.
    pub base_delay_ms: u64,
    /// Upper bound on a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// Result of one HTTP attempt, before retry bookkeeping.
pub(super) struct Attempt {
    pub text: String,
    pub http_status: u16,
}

/// Drive `attempt_fn` under the retry policy.
///
/// Backoff is exponential with up to 25% random jitter. The returned reply
/// carries how many retries ran and whether any attempt saw a rate limit.
pub(super) async fn send_with_retry<F, Fut>(
    provider: &'static str,
    retry: &RetryConfig,
    attempt_fn: F,
) -> Result<LlmReply>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Attempt>>,
{
    let attempts = retry.max_retries.max(1);
    let mut rate_limited = false;
    let mut attempt = 0;

    loop {
        match attempt_fn().await {
            Ok(reply) => {
                return Ok(LlmReply {
                    text: reply.text,
                    http_status: reply.http_status,
                    retry_count: attempt,
                    rate_limited,
                });
            }
            Err(err) => {
                if matches!(err, BenchError::RateLimited { .. }) {
                    rate_limited = true;
                }

                attempt += 1;
                if !err.is_transient() || attempt >= attempts {
                    return Err(err);
                }

                let delay = backoff_delay(retry, attempt - 1);
                tracing::warn!(
                    provider,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient provider error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Exponential backoff with up to 25% jitter, capped at `max_delay_ms`.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exp = attempt.min(16);
    let base = retry
        .base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(retry.max_delay_ms);
    let jitter = (base as f64 * rand::thread_rng().gen_range(0.0..0.25)) as u64;
    Duration::from_millis(base + jitter)
}
