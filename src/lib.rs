//! RAG LLM Bench - a benchmarking harness for comparing LLM endpoints on
//! business-analysis questions through a RAG pipeline.
//!
//! # Overview
//!
//! One batch run:
//! 1. Chunks each industry's dataset into overlapping windows
//! 2. Embeds the chunks locally and loads them into an in-memory vector index
//! 3. Samples questions, retrieves top-k context, and builds a grounded prompt
//! 4. Fans the prompt out to every configured LLM endpoint concurrently
//! 5. Records latency, token counts, throughput, coverage, and failures
//! 6. Appends the records to local JSON/CSV stores and mirrors them
//!    best-effort to remote object storage
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_llm_bench::{
//!     config::Config,
//!     embedder::EmbedderRegistry,
//!     orchestrator::BatchRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     // Load the embedding model once, shared across the batch
//!     let registry = EmbedderRegistry::new();
//!     let embedder = registry.get(&config.embedding_model)?;
//!
//!     // Run a batch and print the per-endpoint summary
//!     let runner = BatchRunner::new(config, embedder);
//!     let report = runner.run_batch("batch-001").await?;
//!     report.summary.print();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **chunker**: overlapping fixed-size character windows
//! - **embedder**: local sentence embeddings (candle), cached per model
//! - **index**: named in-memory vector index, one per industry
//! - **builder**: load -> chunk -> embed -> index
//! - **retriever**: top-k context for a query
//! - **prompt**: deterministic grounded prompt template
//! - **llm**: uniform `generate` over OpenAI-compatible and Gemini APIs
//!   with client-level retry
//! - **orchestrator**: batch loop, concurrent fan-out, record collection
//! - **store**: append-only JSON/CSV evaluation stores
//! - **mirror**: best-effort remote upload of the stores

pub mod builder;
pub mod chunker;
pub mod config;
pub mod dataset;
pub mod embedder;
pub mod error;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod mirror;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod store;

// Re-export commonly used types
pub use builder::build_index;
pub use chunker::{Chunk, ChunkConfig, chunk_documents, chunk_text};
pub use config::Config;
pub use dataset::{DatasetKind, QuestionSet, load_documents};
pub use embedder::{Embedder, EmbedderRegistry, SentenceEmbedder};
pub use error::{BenchError, Result};
pub use index::{ChunkRecord, RowMetadata, VectorIndex};
pub use llm::{EndpointConfig, LlmClient, LlmReply, Provider, build_client};
pub use metrics::{BatchSummary, ErrorType, coverage_score};
pub use orchestrator::{BatchReport, BatchRunner};
pub use prompt::build_prompt;
pub use retriever::retrieve;
pub use store::{EvalStore, EvaluationRecord};
