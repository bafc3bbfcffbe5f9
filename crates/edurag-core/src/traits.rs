use crate::types::{Chunk, Generation, ScoredChunk};

/// Text to fixed-length vector.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Persistent nearest-neighbour store of embedded chunks.
///
/// `query` returns at most `k` hits ordered best first; an index holding fewer
/// than `k` chunks returns what it has.
pub trait VectorIndex {
    fn insert(&self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> anyhow::Result<()>;
    fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>>;
}

/// Remote or local text generation backend.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, prompt: &str, model: &str) -> anyhow::Result<Generation>;
}
