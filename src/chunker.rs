//! Fixed-window text chunking with overlap.
//!
//! Chunks are the unit of retrieval: each window holds at most
//! `chunk_size` characters and shares `overlap` characters with its
//! predecessor. Windows are exact so the original text is recoverable
//! from the chunk sequence.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for text chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared with the previous chunk.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// Check that the parameters describe a terminating window sequence.
    ///
    /// Requires `chunk_size > 0` and `overlap < chunk_size`. Violations are
    /// a caller contract error, not something to clamp silently.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BenchError::InvalidChunking(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(BenchError::InvalidChunking(format!(
                "overlap ({}) must be less than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Characters each window advances past the previous one.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A chunk of text tagged with its position in the flattened sequence and
/// the document it was cut from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential id across the whole dataset.
    pub chunk_id: usize,
    /// Index of the source document in load order.
    pub doc_index: usize,
    /// Chunk text content.
    pub text: String,
}

/// Split text into overlapping fixed-size character windows.
///
/// Windows advance by `chunk_size - overlap` characters; the final window
/// is truncated to the remainder of the text. Empty input yields an empty
/// vec.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<String>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}

/// Chunk a list of documents into one flattened sequence.
///
/// Per-document order is preserved and each chunk keeps the index of the
/// document it came from, so row-level metadata can be joined back later.
pub fn chunk_documents(documents: &[String], config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for (doc_index, document) in documents.iter().enumerate() {
        for text in chunk_text(document, config)? {
            chunks.push(Chunk {
                chunk_id: chunks.len(),
                doc_index,
                text,
            });
        }
    }
    Ok(chunks)
}
