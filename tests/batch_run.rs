//! End-to-end batch runs over temp-dir datasets, a fake embedder, and
//! mocked provider endpoints.

use rag_llm_bench::chunker::ChunkConfig;
use rag_llm_bench::config::{BatchConfig, Config, DatasetConfig, StorageConfig};
use rag_llm_bench::dataset::{DatasetKind, sample_retail_csv};
use rag_llm_bench::embedder::Embedder;
use rag_llm_bench::error::Result;
use rag_llm_bench::llm::{EndpointConfig, Provider};
use rag_llm_bench::orchestrator::BatchRunner;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Deterministic fake: a normalized 4-bucket byte histogram.
struct HistogramEmbedder;

impl Embedder for HistogramEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = [1.0f32; 4];
                for b in text.bytes() {
                    v[(b % 4) as usize] += 1.0;
                }
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                v.iter().map(|x| x / norm).collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        4
    }
}

fn write_fixtures(dir: &Path) {
    fs::write(dir.join("retail.csv"), sample_retail_csv()).unwrap();
    fs::write(
        dir.join("finance.csv"),
        "account,quarter,note\n\
         Travel,Q1,Travel expenses doubled after office reopenings.\n\
         Software,Q2,Software subscriptions grew at a steady pace.\n",
    )
    .unwrap();
    fs::write(
        dir.join("questions.json"),
        json!({
            "retail": [
                "Which category grew after the promotion?",
                "How did apparel revenue change?"
            ],
            "finance": ["Which expense doubled?"],
            "health": ["Question for an industry with no dataset file"]
        })
        .to_string(),
    )
    .unwrap();
}

fn endpoint(provider: Provider, model: &str, api_base: &str, max_retries: u32) -> EndpointConfig {
    EndpointConfig {
        provider,
        model: model.to_string(),
        api_base: Some(api_base.to_string()),
        api_key: Some("test-key".to_string()),
        api_key_env: None,
        max_retries: Some(max_retries),
        base_delay_ms: Some(1),
        timeout_secs: 60,
        temperature: 0.0,
        max_tokens: 128,
    }
}

fn test_config(dir: &Path, endpoints: Vec<EndpointConfig>) -> Config {
    let mut datasets = BTreeMap::new();
    datasets.insert(
        "retail".to_string(),
        DatasetConfig {
            path: dir.join("retail.csv"),
            kind: DatasetKind::Csv,
            text_column: Some("description".to_string()),
        },
    );
    datasets.insert(
        "finance".to_string(),
        DatasetConfig {
            path: dir.join("finance.csv"),
            kind: DatasetKind::Csv,
            text_column: Some("note".to_string()),
        },
    );
    // Configured but the file never exists: the industry must be skipped.
    datasets.insert(
        "health".to_string(),
        DatasetConfig {
            path: dir.join("missing.csv"),
            kind: DatasetKind::Csv,
            text_column: None,
        },
    );

    Config {
        endpoints,
        datasets,
        questions_path: dir.join("questions.json"),
        embedding_model: "test-histogram".to_string(),
        chunking: ChunkConfig {
            chunk_size: 200,
            overlap: 20,
        },
        storage: StorageConfig {
            json_path: dir.join("results/evaluations.json"),
            csv_path: dir.join("results/evaluations.csv"),
            mirror_url: None,
            mirror_token_env: None,
        },
        batch: BatchConfig {
            sample_size: 10, // more than available: take every pair
            top_k: 2,
        },
    }
}

async fn healthy_openai_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Electronics sales rose sharply while Grocery demand stayed flat and Apparel revenue dipped overall."
                },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;
    server
}

async fn healthy_gemini_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Travel expenses doubled."}], "role": "model"},
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;
    server
}

async fn failing_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_string("boom"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn batch_records_every_question_endpoint_pair() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let healthy_a = healthy_openai_server().await;
    let healthy_b = healthy_gemini_server().await;
    let broken = failing_server(500).await;

    let config = test_config(
        dir.path(),
        vec![
            endpoint(Provider::Openai, "model-a", &healthy_a.uri(), 3),
            endpoint(Provider::Gemini, "model-b", &healthy_b.uri(), 2),
            endpoint(Provider::Openai, "model-broken", &broken.uri(), 2),
        ],
    );

    let runner = BatchRunner::new(config, Arc::new(HistogramEmbedder));
    let report = runner.run_batch("batch-test").await.unwrap();

    // 3 answerable (industry, question) pairs x 3 endpoints; the "health"
    // industry's index cannot build and produces no records.
    assert_eq!(report.appended, 9);
    assert_eq!(report.total_stored, 9);

    let records = runner.store().load_json().unwrap();
    assert_eq!(records.len(), 9);
    assert!(records.iter().all(|r| r.industry != "health"));
    assert!(records.iter().all(|r| r.batch_id == "batch-test"));

    // Exactly one failure per question, all from the broken endpoint.
    let failures: Vec<_> = records.iter().filter(|r| !r.success).collect();
    assert_eq!(failures.len(), 3);
    for failure in &failures {
        assert_eq!(failure.llm_model, "model-broken");
        assert_eq!(failure.error_type.as_deref(), Some("api_error"));
        assert_eq!(failure.http_status, Some(500));
        assert!(failure.error.is_some());
        // Transient failure: the retry budget was spent.
        assert_eq!(failure.retry_count, 1);
    }

    // Successes carry sane metrics.
    for record in records.iter().filter(|r| r.success) {
        assert!(record.response_tokens > 0);
        assert_eq!(
            record.total_tokens,
            record.prompt_tokens + record.response_tokens
        );
        assert!(record.latency_sec >= 0.0);
        assert!((0.0..=1.0).contains(&record.coverage_score));
        assert_eq!(record.http_status, Some(200));
        assert!(record.error.is_none());
    }

    // The retail answer reuses context words, so it must show coverage.
    let retail_success = records
        .iter()
        .find(|r| r.success && r.industry == "retail" && r.llm_model == "model-a")
        .unwrap();
    assert!(retail_success.coverage_score > 0.0);
    assert!(retail_success.response_contains_context);
}

#[tokio::test]
async fn timing_out_endpoint_is_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let healthy_a = healthy_openai_server().await;
    let healthy_b = healthy_gemini_server().await;

    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("never arrives in time")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;

    let mut slow_endpoint = endpoint(Provider::Openai, "model-slow", &slow.uri(), 1);
    slow_endpoint.timeout_secs = 1;

    let mut config = test_config(
        dir.path(),
        vec![
            endpoint(Provider::Openai, "model-a", &healthy_a.uri(), 3),
            endpoint(Provider::Gemini, "model-b", &healthy_b.uri(), 2),
            slow_endpoint,
        ],
    );
    config.batch.sample_size = 1;

    let runner = BatchRunner::new(config, Arc::new(HistogramEmbedder));
    let report = runner.run_batch("batch-timeout").await.unwrap();

    // One question, one record per endpoint.
    assert_eq!(report.appended, 3);

    let records = runner.store().load_json().unwrap();
    let failures: Vec<_> = records.iter().filter(|r| !r.success).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].llm_model, "model-slow");
    assert_eq!(failures[0].error_type.as_deref(), Some("timeout"));
    assert_eq!(failures[0].http_status, None);
    assert!(!failures[0].rate_limit_hit);
}

#[tokio::test]
async fn two_batches_append_without_overwriting() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let healthy = healthy_openai_server().await;
    let config = test_config(
        dir.path(),
        vec![endpoint(Provider::Openai, "model-a", &healthy.uri(), 3)],
    );

    let runner = BatchRunner::new(config, Arc::new(HistogramEmbedder));

    let first = runner.run_batch("batch-1").await.unwrap();
    let second = runner.run_batch("batch-2").await.unwrap();

    assert_eq!(first.appended, 3);
    assert_eq!(second.appended, 3);
    assert_eq!(second.total_stored, first.appended + second.appended);

    let records = runner.store().load_json().unwrap();
    assert_eq!(records.len(), 6);
    assert_eq!(records.iter().filter(|r| r.batch_id == "batch-1").count(), 3);
    assert_eq!(records.iter().filter(|r| r.batch_id == "batch-2").count(), 3);

    // CSV store mirrors the count: one header plus six rows.
    let csv_content = fs::read_to_string(dir.path().join("results/evaluations.csv")).unwrap();
    assert_eq!(csv_content.lines().count(), 7);
}

#[tokio::test]
async fn sample_size_bounds_the_batch() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let healthy = healthy_openai_server().await;
    let mut config = test_config(
        dir.path(),
        vec![endpoint(Provider::Openai, "model-a", &healthy.uri(), 3)],
    );
    config.batch.sample_size = 2;

    let runner = BatchRunner::new(config, Arc::new(HistogramEmbedder));
    let report = runner.run_batch("batch-small").await.unwrap();

    assert_eq!(report.appended, 2);

    // Sampling is without replacement: the two questions differ.
    let records = runner.store().load_json().unwrap();
    assert_ne!(records[0].question, records[1].question);
}

#[tokio::test]
async fn mirror_failure_does_not_fail_the_batch() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let healthy = healthy_openai_server().await;
    let dead_mirror = failing_server(503).await;

    let mut config = test_config(
        dir.path(),
        vec![endpoint(Provider::Openai, "model-a", &healthy.uri(), 3)],
    );
    config.storage.mirror_url = Some(dead_mirror.uri());

    let runner = BatchRunner::new(config, Arc::new(HistogramEmbedder));
    let report = runner.run_batch("batch-mirrored").await.unwrap();

    // Local persistence succeeded even though every upload failed.
    assert_eq!(report.appended, 3);
    assert!(dir.path().join("results/evaluations.json").exists());
    assert!(dir.path().join("results/evaluations.csv").exists());
}

#[tokio::test]
async fn mirror_uploads_both_stores() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let healthy = healthy_openai_server().await;
    let mirror = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mirror)
        .await;

    let mut config = test_config(
        dir.path(),
        vec![endpoint(Provider::Openai, "model-a", &healthy.uri(), 3)],
    );
    config.storage.mirror_url = Some(mirror.uri());

    let runner = BatchRunner::new(config, Arc::new(HistogramEmbedder));
    runner.run_batch("batch-mirrored").await.unwrap();
    // expect(2) on the mirror verifies one PUT per store file.
}
