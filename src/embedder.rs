//! Sentence embeddings via candle + sentence-transformers.
//!
//! The model is expensive to load, so [`EmbedderRegistry`] caches one
//! instance per model id for the lifetime of the process. Components take
//! the [`Embedder`] trait so tests can substitute a deterministic fake.

use crate::error::{BenchError, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

/// Default sentence-transformers model.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Text-to-vector interface.
///
/// Implementations must be deterministic (same text, same vector) and safe
/// to share across threads; inference holds no per-call state.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input,
    /// order preserving. Empty input yields an empty vec.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embedding vector length.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text])?;
        embeddings
            .pop()
            .ok_or_else(|| BenchError::Embedding("empty embedding batch result".to_string()))
    }
}

/// Local BERT sentence embedder.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    normalize: bool,
}

impl SentenceEmbedder {
    /// Load a sentence-transformers model from the Hugging Face Hub.
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu; // CPU for portability and determinism

        let api =
            Api::new().map_err(|e| BenchError::Embedding(format!("HF Hub API: {}", e)))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| BenchError::Embedding(format!("fetch config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| BenchError::Embedding(format!("fetch tokenizer.json: {}", e)))?;
        let weights_path = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(|e| BenchError::Embedding(format!("fetch model weights: {}", e)))?;

        let config_text = std::fs::read_to_string(&config_path)
            .map_err(|e| BenchError::io(&config_path, e))?;
        let config: BertConfig = serde_json::from_str(&config_text)
            .map_err(|e| BenchError::Embedding(format!("parse model config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| BenchError::Embedding(format!("load tokenizer: {}", e)))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| BenchError::Embedding(format!("load model weights: {}", e)))?
        };

        let dimension = config.hidden_size;
        let model = BertModel::load(vb, &config)
            .map_err(|e| BenchError::Embedding(format!("load BERT model: {}", e)))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
            normalize: true,
        })
    }
}

impl Embedder for SentenceEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| BenchError::Embedding(format!("tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids_vec = Vec::new();
        let mut attention_mask_vec = Vec::new();
        let mut token_type_ids_vec = Vec::new();

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();

            let mut padded_ids = ids.to_vec();
            let mut padded_mask = mask.to_vec();
            let mut padded_types = vec![0u32; ids.len()];

            padded_ids.resize(max_len, 0);
            padded_mask.resize(max_len, 0);
            padded_types.resize(max_len, 0);

            input_ids_vec.extend(padded_ids);
            attention_mask_vec.extend(padded_mask);
            token_type_ids_vec.extend(padded_types);
        }

        let batch_size = texts.len();

        let input_ids = Tensor::from_vec(input_ids_vec, (batch_size, max_len), &self.device)?;
        let attention_mask =
            Tensor::from_vec(attention_mask_vec, (batch_size, max_len), &self.device)?;
        let token_type_ids =
            Tensor::from_vec(token_type_ids_vec, (batch_size, max_len), &self.device)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over the sequence dimension, masked by attention.
        let attention_mask_expanded = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;

        let sum_embeddings = (output * &attention_mask_expanded)?.sum(1)?;
        let sum_mask = attention_mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;
        let mean_embeddings = (sum_embeddings / sum_mask)?;

        let final_embeddings = if self.normalize {
            let norms = mean_embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
            let shape = mean_embeddings.shape().clone();
            (mean_embeddings / norms.broadcast_as(&shape)?)?
        } else {
            mean_embeddings
        };

        let embeddings_vec: Vec<f32> = final_embeddings
            .to_vec2::<f32>()?
            .into_iter()
            .flatten()
            .collect();

        let embedding_dim = final_embeddings.dim(1)?;
        let result: Vec<Vec<f32>> = embeddings_vec
            .chunks(embedding_dim)
            .map(|c| c.to_vec())
            .collect();

        Ok(result)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Process-wide embedder cache keyed by model id.
///
/// Each model loads at most once; callers receive shared handles. Passed
/// explicitly to components that embed rather than living as a hidden
/// global.
#[derive(Default)]
pub struct EmbedderRegistry {
    models: Mutex<HashMap<String, Arc<SentenceEmbedder>>>,
}

impl EmbedderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the embedder for `model_id`, loading it on first use.
    pub fn get(&self, model_id: &str) -> Result<Arc<dyn Embedder>> {
        let mut models = self
            .models
            .lock()
            .map_err(|_| BenchError::Embedding("embedder registry lock poisoned".to_string()))?;

        if let Some(embedder) = models.get(model_id) {
            return Ok(embedder.clone() as Arc<dyn Embedder>);
        }

        let embedder = Arc::new(SentenceEmbedder::load(model_id)?);
        models.insert(model_id.to_string(), embedder.clone());
        Ok(embedder as Arc<dyn Embedder>)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 on length mismatch or a zero-norm operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
