//! Batch evaluation orchestration.
//!
//! One batch: build an index per industry, sample questions, retrieve
//! context, and fan each prompt out to every configured endpoint
//! concurrently. Every call ends as a record; failures are recorded, not
//! propagated. The main task is the only store writer.

use crate::builder::build_index;
use crate::config::Config;
use crate::dataset::QuestionSet;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::llm::{LlmClient, build_client};
use crate::metrics::{BatchSummary, ErrorType, count_tokens, coverage_score, throughput_tps};
use crate::mirror::{HttpMirror, ObjectMirror, mirror_best_effort};
use crate::prompt::build_prompt;
use crate::retriever::retrieve;
use crate::store::{EvalStore, EvaluationRecord};
use chrono::Utc;
use futures::future::join_all;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// What one batch produced.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: String,
    /// Records appended by this batch.
    pub appended: usize,
    /// Records now in the JSON store.
    pub total_stored: usize,
    /// Per-endpoint aggregation of this batch's records.
    pub summary: BatchSummary,
}

/// Runs evaluation batches.
pub struct BatchRunner {
    config: Config,
    embedder: Arc<dyn Embedder>,
    clients: Vec<Arc<dyn LlmClient>>,
    store: EvalStore,
    mirror: Option<Arc<dyn ObjectMirror>>,
}

impl BatchRunner {
    /// Build a runner from configuration and a shared embedder.
    ///
    /// Clients are constructed up front; a missing credential surfaces per
    /// call as a failed record. The mirror is configured from
    /// `storage.mirror_url` when present.
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        let clients: Vec<Arc<dyn LlmClient>> = config
            .endpoints
            .iter()
            .map(|endpoint| Arc::from(build_client(endpoint)))
            .collect();

        let store = EvalStore::new(&config.storage.json_path, &config.storage.csv_path);

        let mirror: Option<Arc<dyn ObjectMirror>> =
            config.storage.mirror_url.as_ref().map(|url| {
                let token = config
                    .storage
                    .mirror_token_env
                    .as_ref()
                    .and_then(|var| std::env::var(var).ok());
                Arc::new(HttpMirror::new(url.clone(), token)) as Arc<dyn ObjectMirror>
            });

        Self {
            config,
            embedder,
            clients,
            store,
            mirror,
        }
    }

    /// Replace the mirror destination (used by tests and custom setups).
    pub fn with_mirror(mut self, mirror: Arc<dyn ObjectMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn store(&self) -> &EvalStore {
        &self.store
    }

    /// Run one batch and append its records to the stores.
    pub async fn run_batch(&self, batch_id: &str) -> Result<BatchReport> {
        let questions = QuestionSet::load(&self.config.questions_path)?;
        let indices = self.build_indices(&questions);

        // Only industries whose index built are eligible for sampling.
        let pairs: Vec<(String, String)> = questions
            .flatten()
            .into_iter()
            .filter(|(industry, _)| indices.contains_key(industry))
            .collect();

        let selected = sample_pairs(&pairs, self.config.batch.sample_size);
        tracing::info!(
            batch_id,
            candidates = pairs.len(),
            selected = selected.len(),
            endpoints = self.clients.len(),
            "starting evaluation batch"
        );

        let mut records = Vec::new();
        for (industry, question) in &selected {
            let index = &indices[industry];

            let context = match retrieve(
                question,
                index,
                self.embedder.as_ref(),
                self.config.batch.top_k,
            ) {
                Ok(context) => context,
                Err(err) => {
                    tracing::error!(industry = %industry, question = %question, error = %err, "retrieval failed; skipping question");
                    continue;
                }
            };

            let prompt = build_prompt(question, &context);
            let context_text = context
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            // All endpoints answer the same question at once; workers
            // rejoin before the next question starts.
            let calls = self.clients.iter().map(|client| {
                evaluate_call(
                    client.clone(),
                    industry,
                    question,
                    &prompt,
                    &context_text,
                    batch_id,
                )
            });
            records.extend(join_all(calls).await);
        }

        let total_stored = self.store.append(&records)?;

        if let Some(mirror) = &self.mirror {
            mirror_best_effort(
                mirror.as_ref(),
                &[self.store.json_path(), self.store.csv_path()],
            )
            .await;
        }

        let summary = BatchSummary::from_records(&records);
        tracing::info!(
            batch_id,
            appended = records.len(),
            total_stored,
            "batch complete"
        );

        Ok(BatchReport {
            batch_id: batch_id.to_string(),
            appended: records.len(),
            total_stored,
            summary,
        })
    }

    /// Build one index per industry that has both questions and a dataset.
    ///
    /// A failed build loses that industry for this batch but never the
    /// batch itself.
    fn build_indices(&self, questions: &QuestionSet) -> HashMap<String, VectorIndex> {
        let mut indices = HashMap::new();

        for industry in questions.industries() {
            let Some(dataset) = self.config.datasets.get(industry) else {
                tracing::warn!(industry, "no dataset configured; skipping industry");
                continue;
            };

            match build_index(
                &dataset.path,
                dataset.kind,
                dataset.text_column.as_deref(),
                &self.config.chunking,
                self.embedder.as_ref(),
                industry,
            ) {
                Ok(index) => {
                    tracing::info!(industry, chunks = index.len(), "index built");
                    indices.insert(industry.to_string(), index);
                }
                Err(err) => {
                    tracing::error!(industry, error = %err, "index build failed; skipping industry");
                }
            }
        }

        indices
    }
}

/// Uniform sample without replacement from the flattened question list.
fn sample_pairs(pairs: &[(String, String)], sample_size: usize) -> Vec<(String, String)> {
    let mut rng = rand::thread_rng();
    pairs
        .choose_multiple(&mut rng, sample_size.min(pairs.len()))
        .cloned()
        .collect()
}

/// Run one (question, endpoint) call and turn the outcome into a record.
///
/// Never fails: errors become `success=false` records.
async fn evaluate_call(
    client: Arc<dyn LlmClient>,
    industry: &str,
    question: &str,
    prompt: &str,
    context_text: &str,
    batch_id: &str,
) -> EvaluationRecord {
    let prompt_tokens = count_tokens(prompt);
    let started = Instant::now();
    let outcome = client.generate(prompt).await;
    let latency_sec = started.elapsed().as_secs_f64();

    let mut record = EvaluationRecord {
        timestamp: Utc::now().to_rfc3339(),
        industry: industry.to_string(),
        question: question.to_string(),
        llm_provider: client.provider().to_string(),
        llm_model: client.model().to_string(),
        latency_sec,
        prompt_tokens,
        response_tokens: 0,
        total_tokens: prompt_tokens,
        throughput_tps: 0.0,
        success: false,
        error: None,
        batch_id: batch_id.to_string(),
        retry_count: 0,
        rate_limit_hit: false,
        error_type: None,
        response_length: 0,
        response_contains_context: false,
        coverage_score: 0.0,
        http_status: None,
    };

    match outcome {
        Ok(reply) => {
            let response_tokens = count_tokens(&reply.text);
            let coverage = coverage_score(&reply.text, context_text);

            record.response_tokens = response_tokens;
            record.total_tokens = prompt_tokens + response_tokens;
            record.throughput_tps = throughput_tps(response_tokens, latency_sec);
            record.success = true;
            record.retry_count = reply.retry_count;
            record.rate_limit_hit = reply.rate_limited;
            record.response_length = reply.text.len();
            record.response_contains_context = coverage > 0.0;
            record.coverage_score = coverage;
            record.http_status = Some(reply.http_status);
        }
        Err(err) => {
            let error_type = ErrorType::classify(&err);
            // Transient failures only surface once the retry budget is
            // spent; immediate failures never retried.
            record.retry_count = if err.is_transient() {
                client.max_retries().saturating_sub(1)
            } else {
                0
            };
            record.rate_limit_hit = error_type == ErrorType::RateLimit;
            record.http_status = err.http_status();
            record.error = Some(err.to_string());
            record.error_type = Some(error_type.as_str().to_string());

            tracing::warn!(
                industry,
                provider = client.provider(),
                model = client.model(),
                error_type = error_type.as_str(),
                "call failed; recorded"
            );
        }
    }

    record
}
