//! RAG index construction: load -> chunk -> embed -> index.

use crate::chunker::{ChunkConfig, chunk_documents};
use crate::dataset::{DatasetKind, load_documents};
use crate::embedder::Embedder;
use crate::error::Result;
use crate::index::{ChunkRecord, VectorIndex};
use std::path::Path;

/// Texts are embedded this many at a time.
const EMBED_BATCH_SIZE: usize = 32;

/// Build a fresh vector index for one dataset.
///
/// Loads the documents, chunks them into overlapping windows, embeds each
/// chunk, and stores them with `{text, chunk_id}` metadata. Chunks cut from
/// a CSV row carry that row's fields; chunks from text datasets carry
/// `None`.
pub fn build_index(
    path: &Path,
    kind: DatasetKind,
    text_column: Option<&str>,
    chunk_config: &ChunkConfig,
    embedder: &dyn Embedder,
    name: &str,
) -> Result<VectorIndex> {
    let dataset = load_documents(path, kind, text_column)?;
    let chunks = chunk_documents(&dataset.documents, chunk_config)?;

    let records: Vec<ChunkRecord> = chunks
        .iter()
        .map(|chunk| ChunkRecord {
            text: chunk.text.clone(),
            chunk_id: chunk.chunk_id,
            row: dataset
                .rows
                .as_ref()
                .and_then(|rows| rows.get(chunk.doc_index).cloned()),
        })
        .collect();

    let mut index = VectorIndex::new(name);

    for (chunk_batch, record_batch) in chunks
        .chunks(EMBED_BATCH_SIZE)
        .zip(records.chunks(EMBED_BATCH_SIZE))
    {
        let texts: Vec<&str> = chunk_batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        index.add(embeddings, record_batch.to_vec())?;
    }

    Ok(index)
}
