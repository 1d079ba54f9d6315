//! RAG LLM Bench CLI
//!
//! A RAG benchmarking harness for comparing LLM endpoints on
//! business-analysis questions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_llm_bench::{
    builder::build_index,
    config::Config,
    dataset::DatasetKind,
    embedder::EmbedderRegistry,
    llm::build_client,
    metrics::BatchSummary,
    orchestrator::BatchRunner,
    prompt::build_prompt,
    retriever::retrieve,
    store::EvalStore,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

/// RAG LLM Bench - compare LLM endpoints on business-analysis questions
#[derive(Parser)]
#[command(name = "rag-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evaluation batch across all configured endpoints
    Run {
        /// Identifier recorded with every record of this batch
        #[arg(short, long, default_value = "batch-001")]
        batch_id: String,

        /// Number of (industry, question) pairs to sample
        #[arg(short, long)]
        sample_size: Option<usize>,

        /// Number of context chunks to retrieve per question
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Build one industry's index and print its stats
    Index {
        /// Industry name from the config, or a direct dataset path
        industry: String,

        /// Dataset kind when `industry` is a direct path
        #[arg(long, default_value = "csv")]
        kind: String,

        /// CSV text column when `industry` is a direct path
        #[arg(long)]
        text_column: Option<String>,
    },

    /// Ask one question against an industry's dataset
    Ask {
        /// Industry name from the config
        industry: String,

        /// The question
        question: String,

        /// Endpoint index to answer with (position in the config list)
        #[arg(short, long, default_value_t = 0)]
        endpoint: usize,

        /// Number of context chunks to retrieve
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// Summarize the evaluation store per endpoint
    Summary,

    /// Test connectivity against every configured endpoint
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rag_llm_bench=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path).context("Failed to load configuration")?,
        None => Config::load().context("Failed to load configuration")?,
    };

    match cli.command {
        Commands::Run {
            batch_id,
            sample_size,
            top_k,
        } => cmd_run(config, batch_id, sample_size, top_k).await,
        Commands::Index {
            industry,
            kind,
            text_column,
        } => cmd_index(config, industry, kind, text_column),
        Commands::Ask {
            industry,
            question,
            endpoint,
            top_k,
        } => cmd_ask(config, industry, question, endpoint, top_k).await,
        Commands::Summary => cmd_summary(config),
        Commands::Test => cmd_test(config).await,
    }
}

async fn cmd_run(
    mut config: Config,
    batch_id: String,
    sample_size: Option<usize>,
    top_k: Option<usize>,
) -> Result<()> {
    if let Some(sample_size) = sample_size {
        config.batch.sample_size = sample_size;
    }
    if let Some(top_k) = top_k {
        config.batch.top_k = top_k;
    }
    config.validate().context("Invalid configuration")?;

    println!("Loading embedding model: {}", config.embedding_model);
    let registry = EmbedderRegistry::new();
    let embedder = registry
        .get(&config.embedding_model)
        .context("Failed to load embedding model")?;

    println!(
        "Running batch '{}' ({} endpoints, sample size {}, top-k {})",
        batch_id,
        config.endpoints.len(),
        config.batch.sample_size,
        config.batch.top_k
    );

    let start = Instant::now();
    let runner = BatchRunner::new(config, embedder);
    let report = runner
        .run_batch(&batch_id)
        .await
        .context("Batch run failed")?;

    report.summary.print();
    println!(
        "Appended {} records ({} total in store) in {:.1?}",
        report.appended,
        report.total_stored,
        start.elapsed()
    );

    Ok(())
}

fn cmd_index(
    config: Config,
    industry: String,
    kind: String,
    text_column: Option<String>,
) -> Result<()> {
    // Resolve from config first; fall back to treating `industry` as a path.
    let (path, dataset_kind, column) = match config.datasets.get(&industry) {
        Some(dataset) => (
            dataset.path.clone(),
            dataset.kind,
            dataset.text_column.clone(),
        ),
        None => (
            PathBuf::from(&industry),
            DatasetKind::from_str(&kind)?,
            text_column,
        ),
    };

    println!("Building index for: {}", path.display());
    println!("Loading embedding model: {}", config.embedding_model);

    let registry = EmbedderRegistry::new();
    let embedder = registry
        .get(&config.embedding_model)
        .context("Failed to load embedding model")?;

    let start = Instant::now();
    let index = build_index(
        &path,
        dataset_kind,
        column.as_deref(),
        &config.chunking,
        embedder.as_ref(),
        &industry,
    )
    .context("Failed to build index")?;

    println!("\nIndex Built:");
    println!("  Name:       {}", index.name());
    println!("  Chunks:     {}", index.len());
    println!(
        "  Dimensions: {}",
        index
            .dimension()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Build time: {:.2?}", start.elapsed());

    Ok(())
}

async fn cmd_ask(
    config: Config,
    industry: String,
    question: String,
    endpoint: usize,
    top_k: usize,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let dataset = config
        .datasets
        .get(&industry)
        .with_context(|| format!("No dataset configured for industry '{}'", industry))?;
    let endpoint_config = config
        .endpoints
        .get(endpoint)
        .with_context(|| format!("No endpoint at index {}", endpoint))?;

    println!("Loading embedding model: {}", config.embedding_model);
    let registry = EmbedderRegistry::new();
    let embedder = registry
        .get(&config.embedding_model)
        .context("Failed to load embedding model")?;

    println!("Building index for '{}'...", industry);
    let index = build_index(
        &dataset.path,
        dataset.kind,
        dataset.text_column.as_deref(),
        &config.chunking,
        embedder.as_ref(),
        &industry,
    )
    .context("Failed to build index")?;

    let context = retrieve(&question, &index, embedder.as_ref(), top_k)
        .context("Retrieval failed")?;

    println!("\nRetrieved {} context chunks:", context.len());
    for record in &context {
        let preview: String = record.text.chars().take(80).collect();
        println!("  [{}] {}", record.chunk_id, preview);
    }

    let prompt = build_prompt(&question, &context);
    let client = build_client(endpoint_config);

    println!(
        "\nAsking {}/{}...",
        client.provider(),
        client.model()
    );
    let start = Instant::now();
    let reply = client.generate(&prompt).await.context("Generation failed")?;

    println!("\nAnswer ({:.2?}):", start.elapsed());
    println!("{}", reply.text);

    Ok(())
}

fn cmd_summary(config: Config) -> Result<()> {
    let store = EvalStore::new(&config.storage.json_path, &config.storage.csv_path);
    let records = store.load_json().context("Failed to load evaluation store")?;

    if records.is_empty() {
        println!(
            "No records in {}. Run a batch first.",
            config.storage.json_path.display()
        );
        return Ok(());
    }

    println!(
        "{} records in {}",
        records.len(),
        config.storage.json_path.display()
    );
    BatchSummary::from_records(&records).print();

    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    println!("Testing {} endpoints...\n", config.endpoints.len());

    let mut failures = 0;
    for endpoint_config in &config.endpoints {
        let client = build_client(endpoint_config);
        print!("  {}/{} ... ", client.provider(), client.model());

        match client.generate("Reply with the single word: ready").await {
            Ok(reply) => {
                let preview: String = reply.text.chars().take(40).collect();
                println!("ok ({})", preview.trim());
            }
            Err(e) => {
                failures += 1;
                println!("FAILED: {}", e);
            }
        }
    }

    if failures > 0 {
        println!("\n{} endpoint(s) failed.", failures);
    } else {
        println!("\nAll endpoints reachable.");
    }

    Ok(())
}
