//! Append-only persistence for evaluation records.
//!
//! Two local stores hold the same records: a JSON array (the canonical
//! one) and a flattened CSV table. Batches extend both; nothing ever
//! overwrites prior batches. Local persistence is the durability
//! guarantee; remote mirroring is best-effort on top.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The outcome of one (question, endpoint) call.
///
/// Created once, appended, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// RFC 3339 creation time.
    pub timestamp: String,
    pub industry: String,
    pub question: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub latency_sec: f64,
    /// Whitespace-split word count of the prompt (a proxy, not a tokenizer).
    pub prompt_tokens: usize,
    pub response_tokens: usize,
    pub total_tokens: usize,
    /// Response tokens per second of wall-clock latency.
    pub throughput_tps: f64,
    pub success: bool,
    pub error: Option<String>,
    pub batch_id: String,
    pub retry_count: u32,
    pub rate_limit_hit: bool,
    pub error_type: Option<String>,
    pub response_length: usize,
    pub response_contains_context: bool,
    pub coverage_score: f64,
    pub http_status: Option<u16>,
}

/// The local evaluation stores.
#[derive(Debug, Clone)]
pub struct EvalStore {
    json_path: PathBuf,
    csv_path: PathBuf,
}

impl EvalStore {
    pub fn new(json_path: impl Into<PathBuf>, csv_path: impl Into<PathBuf>) -> Self {
        Self {
            json_path: json_path.into(),
            csv_path: csv_path.into(),
        }
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Append records to both stores. Returns the total record count in
    /// the JSON store afterwards.
    ///
    /// Call this from a single writer; the stores do no locking of their
    /// own.
    pub fn append(&self, records: &[EvaluationRecord]) -> Result<usize> {
        let total = self.append_json(records)?;
        self.append_csv(records)?;
        Ok(total)
    }

    /// Load every record from the JSON store; an absent file is an empty
    /// store.
    pub fn load_json(&self) -> Result<Vec<EvaluationRecord>> {
        if !self.json_path.exists() {
            return Ok(Vec::new());
        }
        let content =
            fs::read_to_string(&self.json_path).map_err(|e| BenchError::io(&self.json_path, e))?;
        let records: Vec<EvaluationRecord> = serde_json::from_str(&content)?;
        Ok(records)
    }

    fn append_json(&self, records: &[EvaluationRecord]) -> Result<usize> {
        let mut existing = self.load_json()?;
        existing.extend(records.iter().cloned());

        ensure_parent(&self.json_path)?;
        let data = serde_json::to_string_pretty(&existing)?;
        fs::write(&self.json_path, data).map_err(|e| BenchError::io(&self.json_path, e))?;

        Ok(existing.len())
    }

    fn append_csv(&self, records: &[EvaluationRecord]) -> Result<()> {
        ensure_parent(&self.csv_path)?;

        let write_headers = !self.csv_path.exists();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| BenchError::io(&self.csv_path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_headers)
            .from_writer(file);

        for record in records {
            writer
                .serialize(record)
                .map_err(|e| BenchError::Serialization(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| BenchError::io(&self.csv_path, e))?;

        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
        }
    }
    Ok(())
}
