//! Context retrieval: embed a query, return the top-k chunk records.

use crate::embedder::Embedder;
use crate::error::Result;
use crate::index::{ChunkRecord, VectorIndex};

/// Retrieve the `top_k` most similar chunk records for a query.
///
/// The query must be embedded with the same model that built the index;
/// that is the caller's responsibility and is not validated here. The
/// index is only read, so repeated calls with the same inputs return the
/// same ordered results.
pub fn retrieve(
    query: &str,
    index: &VectorIndex,
    embedder: &dyn Embedder,
    top_k: usize,
) -> Result<Vec<ChunkRecord>> {
    let query_embedding = embedder.embed(query)?;
    Ok(index.query(&query_embedding, top_k))
}
