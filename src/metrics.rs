//! Per-call metrics and batch aggregation.
//!
//! Token counts are whitespace-split word counts, a deliberate proxy for
//! comparing free-tier models without shipping each provider's tokenizer.

use crate::error::BenchError;
use crate::store::EvaluationRecord;
use std::collections::{BTreeMap, HashSet};

/// Count tokens as whitespace-separated words.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Response tokens per second. Zero when latency is zero.
pub fn throughput_tps(response_tokens: usize, latency_sec: f64) -> f64 {
    if latency_sec > 0.0 {
        response_tokens as f64 / latency_sec
    } else {
        0.0
    }
}

/// Fraction of unique response words that also appear in the context.
///
/// A crude groundedness proxy: 1.0 means every response word occurs in the
/// retrieved context, 0.0 means none do (or the response is empty). Always
/// within [0, 1]. Comparison is lowercase.
pub fn coverage_score(response: &str, context: &str) -> f64 {
    let response_words: HashSet<String> = response
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    if response_words.is_empty() {
        return 0.0;
    }

    let context_words: HashSet<String> = context
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    let overlap = response_words
        .iter()
        .filter(|w| context_words.contains(*w))
        .count();

    overlap as f64 / response_words.len() as f64
}

/// Failure categories recorded on unsuccessful calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    RateLimit,
    Timeout,
    Network,
    ApiError,
    Other,
}

impl ErrorType {
    /// Stable serialized form used in the evaluation stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::RateLimit => "rate_limit",
            ErrorType::Timeout => "timeout",
            ErrorType::Network => "network",
            ErrorType::ApiError => "api_error",
            ErrorType::Other => "other",
        }
    }

    /// Classify a call failure.
    ///
    /// Typed variants decide directly; anything else falls back to
    /// substring matching on the message.
    pub fn classify(error: &BenchError) -> Self {
        match error {
            BenchError::RateLimited { .. } => ErrorType::RateLimit,
            BenchError::Timeout { .. } => ErrorType::Timeout,
            BenchError::Network { .. } => ErrorType::Network,
            BenchError::ServerError { .. } | BenchError::Api { .. } => ErrorType::ApiError,
            BenchError::MalformedResponse { .. } | BenchError::CredentialMissing(_) => {
                ErrorType::Other
            }
            other => Self::classify_message(&other.to_string()),
        }
    }

    /// Substring-based classification for errors that only exist as text.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("rate limit") || lower.contains("429") {
            ErrorType::RateLimit
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ErrorType::Timeout
        } else if lower.contains("network") || lower.contains("connection") {
            ErrorType::Network
        } else if lower.contains("api") || lower.contains("server") {
            ErrorType::ApiError
        } else {
            ErrorType::Other
        }
    }
}

/// Aggregated figures for one endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointSummary {
    pub calls: usize,
    pub successes: usize,
    pub avg_latency_sec: f64,
    pub avg_throughput_tps: f64,
    pub avg_coverage: f64,
}

/// Per-endpoint aggregation over a record slice.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Keyed by "provider/model", sorted.
    pub endpoints: BTreeMap<String, EndpointSummary>,
}

impl BatchSummary {
    /// Aggregate records per endpoint. Latency, throughput, and coverage
    /// average over successful calls only.
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let mut groups: BTreeMap<String, Vec<&EvaluationRecord>> = BTreeMap::new();
        for record in records {
            let key = format!("{}/{}", record.llm_provider, record.llm_model);
            groups.entry(key).or_default().push(record);
        }

        let mut endpoints = BTreeMap::new();
        for (key, group) in groups {
            let successes: Vec<&&EvaluationRecord> =
                group.iter().filter(|r| r.success).collect();

            let mut summary = EndpointSummary {
                calls: group.len(),
                successes: successes.len(),
                ..Default::default()
            };

            if !successes.is_empty() {
                let n = successes.len() as f64;
                summary.avg_latency_sec =
                    successes.iter().map(|r| r.latency_sec).sum::<f64>() / n;
                summary.avg_throughput_tps =
                    successes.iter().map(|r| r.throughput_tps).sum::<f64>() / n;
                summary.avg_coverage =
                    successes.iter().map(|r| r.coverage_score).sum::<f64>() / n;
            }

            endpoints.insert(key, summary);
        }

        Self { endpoints }
    }

    /// Print the summary table to stdout.
    pub fn print(&self) {
        println!("\n========== Evaluation Summary ==========");
        for (endpoint, s) in &self.endpoints {
            println!("{}", endpoint);
            println!("  calls:          {}", s.calls);
            println!(
                "  successes:      {} ({:.1}%)",
                s.successes,
                if s.calls > 0 {
                    s.successes as f64 / s.calls as f64 * 100.0
                } else {
                    0.0
                }
            );
            println!("  avg latency:    {:.2}s", s.avg_latency_sec);
            println!("  avg throughput: {:.1} tok/s", s.avg_throughput_tps);
            println!("  avg coverage:   {:.2}", s.avg_coverage);
            println!("----------------------------------------");
        }
        println!("========================================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens("one two  three\nfour"), 4);
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("   "), 0);
    }

    #[test]
    fn test_throughput() {
        assert!((throughput_tps(40, 2.0) - 20.0).abs() < 1e-9);
        assert_eq!(throughput_tps(40, 0.0), 0.0);
    }

    #[test]
    fn test_coverage_bounds() {
        // Empty response scores zero.
        assert_eq!(coverage_score("", "some context"), 0.0);
        // Full containment scores one.
        assert_eq!(coverage_score("revenue grew", "revenue grew strongly"), 1.0);
        // No overlap scores zero.
        assert_eq!(coverage_score("unrelated words", "the context"), 0.0);
        // Partial overlap is a proper fraction.
        let score = coverage_score("revenue fell sharply", "revenue grew");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_coverage_is_case_insensitive_and_unique() {
        assert_eq!(coverage_score("Revenue REVENUE revenue", "revenue"), 1.0);
    }

    #[test]
    fn test_classify_typed_errors() {
        let err = BenchError::RateLimited {
            provider: "openai".to_string(),
            message: String::new(),
        };
        assert_eq!(ErrorType::classify(&err), ErrorType::RateLimit);

        let err = BenchError::Timeout {
            provider: "gemini".to_string(),
            message: String::new(),
        };
        assert_eq!(ErrorType::classify(&err), ErrorType::Timeout);

        let err = BenchError::ServerError {
            provider: "openai".to_string(),
            status: 503,
            message: String::new(),
        };
        assert_eq!(ErrorType::classify(&err), ErrorType::ApiError);

        let err = BenchError::MalformedResponse {
            provider: "gemini".to_string(),
            message: "bad shape".to_string(),
        };
        assert_eq!(ErrorType::classify(&err), ErrorType::Other);
    }

    #[test]
    fn test_classify_message_fallback() {
        assert_eq!(
            ErrorType::classify_message("got HTTP 429 back"),
            ErrorType::RateLimit
        );
        assert_eq!(
            ErrorType::classify_message("request timed out"),
            ErrorType::Timeout
        );
        assert_eq!(
            ErrorType::classify_message("connection reset by peer"),
            ErrorType::Network
        );
        assert_eq!(
            ErrorType::classify_message("upstream server exploded"),
            ErrorType::ApiError
        );
        assert_eq!(ErrorType::classify_message("???"), ErrorType::Other);
    }

    #[test]
    fn test_batch_summary_groups_by_endpoint() {
        let mut r1 = sample(true, 1.0, 10.0, 0.5);
        r1.llm_model = "model-a".to_string();
        let mut r2 = sample(true, 3.0, 30.0, 0.7);
        r2.llm_model = "model-a".to_string();
        let mut r3 = sample(false, 9.0, 0.0, 0.0);
        r3.llm_model = "model-b".to_string();

        let summary = BatchSummary::from_records(&[r1, r2, r3]);
        assert_eq!(summary.endpoints.len(), 2);

        let a = &summary.endpoints["openai/model-a"];
        assert_eq!(a.calls, 2);
        assert_eq!(a.successes, 2);
        assert!((a.avg_latency_sec - 2.0).abs() < 1e-9);
        assert!((a.avg_coverage - 0.6).abs() < 1e-9);

        let b = &summary.endpoints["openai/model-b"];
        assert_eq!(b.calls, 1);
        assert_eq!(b.successes, 0);
        assert_eq!(b.avg_latency_sec, 0.0);
    }

    fn sample(
        success: bool,
        latency_sec: f64,
        throughput: f64,
        coverage: f64,
    ) -> EvaluationRecord {
        EvaluationRecord {
            timestamp: "2024-03-01T12:00:00Z".to_string(),
            industry: "retail".to_string(),
            question: "q".to_string(),
            llm_provider: "openai".to_string(),
            llm_model: "model".to_string(),
            latency_sec,
            prompt_tokens: 10,
            response_tokens: 5,
            total_tokens: 15,
            throughput_tps: throughput,
            success,
            error: None,
            batch_id: "b".to_string(),
            retry_count: 0,
            rate_limit_hit: false,
            error_type: None,
            response_length: 0,
            response_contains_context: false,
            coverage_score: coverage,
            http_status: None,
        }
    }
}
