//! Brute-force in-memory index.
use anyhow::{anyhow, bail, Result};
use std::sync::RwLock;
use tracing::debug;

use edurag_core::traits::VectorIndex;
use edurag_core::types::{Chunk, ScoredChunk};

/// Keeps every chunk with its vector and scores queries by cosine similarity.
#[derive(Default)]
pub struct MemoryIndex {
	entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl MemoryIndex {
	pub fn new() -> Self { Self::default() }

	pub fn len(&self) -> usize {
		self.entries.read().map(|e| e.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl VectorIndex for MemoryIndex {
	fn insert(&self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
		if chunks.len() != embeddings.len() {
			bail!("{} chunks but {} embeddings", chunks.len(), embeddings.len());
		}
		let mut entries = self.entries.write().map_err(|_| anyhow!("memory index lock poisoned"))?;
		if let (Some((_, first)), Some(new)) = (entries.first(), embeddings.first()) {
			if first.len() != new.len() {
				bail!("embedding has {} dims, index holds {}", new.len(), first.len());
			}
		}
		entries.extend(chunks.into_iter().zip(embeddings));
		Ok(())
	}

	fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		let entries = self.entries.read().map_err(|_| anyhow!("memory index lock poisoned"))?;
		if let Some((_, first)) = entries.first() {
			if first.len() != vector.len() {
				bail!("query vector has {} dims, index holds {}", vector.len(), first.len());
			}
		}
		let mut scored: Vec<ScoredChunk> = entries
			.iter()
			.map(|(chunk, v)| ScoredChunk { chunk: chunk.clone(), score: cosine_similarity(vector, v) })
			.collect();
		scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		scored.truncate(k);
		debug!(k, hits = scored.len(), "memory search");
		Ok(scored)
	}
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() {
		return 0.0;
	}
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}
