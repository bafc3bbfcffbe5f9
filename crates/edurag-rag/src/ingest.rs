//! Ingestion: load a directory, split it into chunks, embed and store them.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::info;

use edurag_core::chunker::RecursiveSplitter;
use edurag_core::config::ChunkingConfig;
use edurag_core::error::{Error, Result};
use edurag_core::loader::load_documents;
use edurag_core::traits::{Embedder, VectorIndex};
use edurag_core::types::Chunk;

#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents_loaded: usize,
    pub chunks_created: usize,
    pub chunks_stored: usize,
    /// Files that failed to load; the rest of the run went ahead without them.
    pub failures: Vec<Error>,
}

/// Load and split every supported file under `dir`. Chunk parameters are checked
/// before any file is read.
pub fn prepare_chunks(dir: &Path, chunking: &ChunkingConfig) -> Result<(Vec<Chunk>, IngestReport)> {
    let splitter = RecursiveSplitter::new(chunking)?;
    let loaded = load_documents(dir)?;
    let chunks = splitter.split_documents(&loaded.documents);
    info!(documents = loaded.documents.len(), chunks = chunks.len(), failures = loaded.failures.len(), "prepared chunks");
    let report = IngestReport {
        documents_loaded: loaded.documents.len(),
        chunks_created: chunks.len(),
        chunks_stored: 0,
        failures: loaded.failures,
    };
    Ok((chunks, report))
}

/// Embed `chunks` in batches of `batch_size` and insert each batch into `index`.
/// Returns the number of chunks stored.
pub fn index_chunks<V>(index: &V, embedder: &dyn Embedder, chunks: Vec<Chunk>, batch_size: usize, show_progress: bool) -> Result<usize>
where
    V: VectorIndex + ?Sized,
{
    if chunks.is_empty() {
        return Ok(0);
    }
    let total = chunks.len();
    let pb = if show_progress { ProgressBar::new(total as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut stored = 0usize;
    let mut remaining = chunks.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<Chunk> = remaining.by_ref().take(batch_size.max(1)).collect();
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Indexing(format!("embedding chunks: {e:#}")))?;
        if embeddings.len() != batch.len() {
            return Err(Error::Indexing(format!("embedder returned {} vectors for {} chunks", embeddings.len(), batch.len())));
        }
        let n = batch.len();
        index.insert(batch, embeddings).map_err(|e| Error::Indexing(format!("{e:#}")))?;
        stored += n;
        pb.set_position(stored as u64);
    }
    pb.finish_with_message("indexing complete");
    info!(stored, "indexed chunks");
    Ok(stored)
}
