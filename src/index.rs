//! In-memory vector index over chunk records.
//!
//! Indices are named per dataset (one per industry) and ephemeral: each
//! batch run builds a fresh index and drops it with normal scope cleanup.
//! Records are read-only once added.

use crate::embedder::cosine_similarity;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source-row fields carried along for traceability (category, location,
/// date, and whatever else the dataset provides). Ordered so serialized
/// output is stable.
pub type RowMetadata = BTreeMap<String, String>;

/// Metadata stored per indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk text content.
    pub text: String,
    /// Sequential chunk id within the dataset.
    pub chunk_id: usize,
    /// Fields of the source CSV row, when the chunk came from one.
    pub row: Option<RowMetadata>,
}

/// An (embedding, record) pair stored in the index.
#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f32>,
    record: ChunkRecord,
}

/// Named in-memory vector index.
#[derive(Debug)]
pub struct VectorIndex {
    name: String,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index scoped to `name` (typically the industry).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: None,
            entries: Vec::new(),
        }
    }

    /// Name this index is scoped to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of records in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add embedding/record pairs.
    ///
    /// Lengths must match and every embedding must share the dimension
    /// established by the first insert. Pairs receive sequential positions
    /// in arrival order.
    pub fn add(&mut self, embeddings: Vec<Vec<f32>>, records: Vec<ChunkRecord>) -> Result<()> {
        if embeddings.len() != records.len() {
            return Err(BenchError::LengthMismatch {
                embeddings: embeddings.len(),
                records: records.len(),
            });
        }

        let expected = self
            .dimension
            .or_else(|| embeddings.first().map(|e| e.len()));
        if let Some(dim) = expected {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
                return Err(BenchError::Embedding(format!(
                    "index '{}' holds {}-dimensional vectors, got {}",
                    self.name,
                    dim,
                    bad.len()
                )));
            }
            self.dimension = Some(dim);
        }

        for (embedding, record) in embeddings.into_iter().zip(records) {
            self.entries.push(IndexEntry { embedding, record });
        }

        Ok(())
    }

    /// Return up to `top_k` records ordered by decreasing cosine similarity
    /// to `query_embedding`. Returns everything when the index holds fewer
    /// than `top_k` records; `top_k == 0` yields an empty vec.
    pub fn query(&self, query_embedding: &[f32], top_k: usize) -> Vec<ChunkRecord> {
        if top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &ChunkRecord)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    cosine_similarity(query_embedding, &entry.embedding),
                    &entry.record,
                )
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored.into_iter().map(|(_, record)| record.clone()).collect()
    }

    /// Embedding dimension, once at least one record was added.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}
