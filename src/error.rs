//! Error types for the benchmarking harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur in the benchmarking harness.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dataset path does not exist.
    #[error("Dataset not found at '{0}'")]
    DatasetNotFound(PathBuf),

    /// A requested CSV column is absent from the dataset.
    #[error("Column '{column}' not found in dataset '{path}'")]
    ColumnNotFound { column: String, path: PathBuf },

    /// Invalid chunking parameters.
    #[error("Invalid chunking parameters: {0}")]
    InvalidChunking(String),

    /// Embeddings and records passed to the index in unequal numbers.
    #[error("Embedding/record length mismatch: {embeddings} embeddings vs {records} records")]
    LengthMismatch { embeddings: usize, records: usize },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No API credential could be resolved for an endpoint.
    #[error("Missing credential for {0}: set the configured api_key or environment variable")]
    CredentialMissing(String),

    /// Provider returned HTTP 429.
    #[error("{provider} rate limited the request: {message}")]
    RateLimited { provider: String, message: String },

    /// Provider returned a 5xx status.
    #[error("{provider} server error ({status}): {message}")]
    ServerError {
        provider: String,
        status: u16,
        message: String,
    },

    /// Request timed out before the provider responded.
    #[error("{provider} request timed out: {message}")]
    Timeout { provider: String, message: String },

    /// Transport-level failure reaching the provider.
    #[error("{provider} network error: {message}")]
    Network { provider: String, message: String },

    /// Provider returned a non-retryable HTTP error.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Provider returned 2xx with an unexpected body shape.
    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    /// Embedding model load or inference failure.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures worth another attempt: rate limits, server errors,
    /// and transport problems. Parse errors and 4xx responses are final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BenchError::RateLimited { .. }
                | BenchError::ServerError { .. }
                | BenchError::Timeout { .. }
                | BenchError::Network { .. }
        )
    }

    /// The HTTP status carried by this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BenchError::RateLimited { .. } => Some(429),
            BenchError::ServerError { status, .. } | BenchError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}

impl From<candle_core::Error> for BenchError {
    fn from(err: candle_core::Error) -> Self {
        BenchError::Embedding(err.to_string())
    }
}
