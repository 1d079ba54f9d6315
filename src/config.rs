//! Configuration for the benchmarking harness.
//!
//! Supports both environment variables and a YAML config file.
//! Environment variables take precedence over config file values.

use crate::chunker::ChunkConfig;
use crate::dataset::DatasetKind;
use crate::embedder;
use crate::error::{BenchError, Result};
use crate::llm::{EndpointConfig, Provider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// One industry's dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the dataset file.
    pub path: PathBuf,
    /// File format.
    pub kind: DatasetKind,
    /// CSV text column feeding retrieval; first column when unset.
    #[serde(default)]
    pub text_column: Option<String>,
}

/// Local store paths and the optional remote mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON evaluation store.
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
    /// CSV evaluation store.
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    /// Base URL of the remote bucket; mirroring is off when unset.
    #[serde(default)]
    pub mirror_url: Option<String>,
    /// Environment variable holding the mirror bearer token.
    #[serde(default)]
    pub mirror_token_env: Option<String>,
}

fn default_json_path() -> PathBuf {
    PathBuf::from("results/evaluations.json")
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("results/evaluations.csv")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            json_path: default_json_path(),
            csv_path: default_csv_path(),
            mirror_url: None,
            mirror_token_env: None,
        }
    }
}

/// Batch-run knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// (industry, question) pairs sampled per batch.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Context chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_sample_size() -> usize {
    5
}

fn default_top_k() -> usize {
    5
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            top_k: default_top_k(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM endpoints under comparison.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Per-industry datasets.
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,
    /// Question set file (JSON: industry -> questions).
    #[serde(default = "default_questions_path")]
    pub questions_path: PathBuf,
    /// Sentence-embedding model id.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Chunking parameters.
    #[serde(default)]
    pub chunking: ChunkConfig,
    /// Store paths and mirroring.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Batch sampling parameters.
    #[serde(default)]
    pub batch: BatchConfig,
}

fn default_questions_path() -> PathBuf {
    PathBuf::from("data/questions.json")
}

fn default_embedding_model() -> String {
    embedder::DEFAULT_MODEL_ID.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            datasets: BTreeMap::new(),
            questions_path: default_questions_path(),
            embedding_model: default_embedding_model(),
            chunking: ChunkConfig::default(),
            storage: StorageConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (RAG_BENCH_*)
    /// 2. Config file (~/.config/rag-llm-bench/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply
    /// environment overrides.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env();
        Ok(config)
    }

    fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| BenchError::Config(format!("Failed to parse config file: {}", e)))?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = env::var("RAG_BENCH_QUESTIONS") {
            self.questions_path = PathBuf::from(path);
        }
        if let Ok(model) = env::var("RAG_BENCH_EMBEDDING_MODEL") {
            self.embedding_model = model;
        }
        if let Ok(path) = env::var("RAG_BENCH_JSON_STORE") {
            self.storage.json_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("RAG_BENCH_CSV_STORE") {
            self.storage.csv_path = PathBuf::from(path);
        }
        if let Ok(url) = env::var("RAG_BENCH_MIRROR_URL") {
            self.storage.mirror_url = Some(url);
        }
        if let Ok(size) = env::var("RAG_BENCH_SAMPLE_SIZE") {
            if let Ok(size) = size.parse() {
                self.batch.sample_size = size;
            }
        }
        if let Ok(top_k) = env::var("RAG_BENCH_TOP_K") {
            if let Ok(top_k) = top_k.parse() {
                self.batch.top_k = top_k;
            }
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-llm-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present and coherent.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(BenchError::Config(
                "At least one LLM endpoint is required. Add endpoints to the config file."
                    .to_string(),
            ));
        }

        for endpoint in &self.endpoints {
            if endpoint.model.is_empty() {
                return Err(BenchError::Config(format!(
                    "Endpoint for provider '{}' is missing a model name.",
                    endpoint.provider.as_str()
                )));
            }
        }

        self.chunking.validate()?;

        if self.batch.top_k == 0 {
            return Err(BenchError::Config(
                "batch.top_k must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// A config with the reference four-endpoint deployment: two
    /// OpenAI-compatible models and two Gemini models.
    pub fn with_reference_endpoints(mut self) -> Self {
        self.endpoints = vec![
            reference_endpoint(Provider::Openai, "llama-3.1-8b-instant"),
            reference_endpoint(Provider::Openai, "llama-3.3-70b-versatile"),
            reference_endpoint(Provider::Gemini, "gemini-1.5-flash"),
            reference_endpoint(Provider::Gemini, "gemini-1.5-flash-8b"),
        ];
        self
    }
}

fn reference_endpoint(provider: Provider, model: &str) -> EndpointConfig {
    let api_key_env = match provider {
        Provider::Openai => "GROQ_API_KEY",
        Provider::Gemini => "GEMINI_API_KEY",
    };
    let api_base = match provider {
        Provider::Openai => Some("https://api.groq.com/openai".to_string()),
        Provider::Gemini => None,
    };
    EndpointConfig {
        provider,
        model: model.to_string(),
        api_base,
        api_key: None,
        api_key_env: Some(api_key_env.to_string()),
        max_retries: None,
        base_delay_ms: None,
        timeout_secs: 60,
        temperature: 0.0,
        max_tokens: 1024,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.embedding_model, embedder::DEFAULT_MODEL_ID);
        assert_eq!(config.batch.sample_size, 5);
        assert_eq!(config.batch.top_k, 5);
        assert_eq!(config.chunking.chunk_size, 500);
    }

    #[test]
    fn test_validate_fails_without_endpoints() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reference_endpoints_validate() {
        let config = Config::default().with_reference_endpoints();
        assert_eq!(config.endpoints.len(), 4);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
endpoints:
  - provider: openai
    model: llama-3.1-8b-instant
    api_base: https://api.groq.com/openai
    api_key_env: GROQ_API_KEY
  - provider: gemini
    model: gemini-1.5-flash
    api_key_env: GEMINI_API_KEY
    max_retries: 5
datasets:
  retail:
    path: data/retail.csv
    kind: csv
    text_column: description
  finance:
    path: data/finance.csv
    kind: csv
chunking:
  chunk_size: 400
  overlap: 40
batch:
  sample_size: 3
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = Config::load_from(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[1].max_retries, Some(5));
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(
            config.datasets["retail"].text_column.as_deref(),
            Some("description")
        );
        assert!(config.datasets["finance"].text_column.is_none());
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.batch.sample_size, 3);
        // Unset fields fall back to defaults.
        assert_eq!(config.batch.top_k, 5);

        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_chunking() {
        let mut config = Config::default().with_reference_endpoints();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }
}
