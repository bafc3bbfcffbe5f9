use tracing::debug;

use edurag_core::error::{Error, Result};
use edurag_core::traits::{Embedder, VectorIndex};
use edurag_core::types::RetrievalResult;

/// Embeds the query text and asks the index for its nearest chunks.
pub struct Retriever<V: VectorIndex> {
    index: V,
    embedder: Box<dyn Embedder>,
}

impl<V: VectorIndex> Retriever<V> {
    pub fn new(index: V, embedder: Box<dyn Embedder>) -> Self { Self { index, embedder } }

    pub fn index(&self) -> &V { &self.index }

    /// At most `top_k` chunks, best first, exactly as the index ranked them.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<RetrievalResult> {
        if top_k == 0 {
            return Err(Error::Configuration("top_k must be positive".to_string()));
        }
        let vector = self
            .embedder
            .embed(query)
            .map_err(|e| Error::Retrieval(format!("embedding query: {e:#}")))?;
        let hits = self
            .index
            .query(&vector, top_k)
            .map_err(|e| Error::Retrieval(format!("{e:#}")))?;
        debug!(top_k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
