//! Domain types shared by the chunker, the vector stores and the query pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raw text of one loaded file plus the identifier it was loaded from.
///
/// `source` is the discovered path as a string; it is copied into every chunk
/// produced from this document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { content: content.into(), source: source.into() }
    }
}

/// Lineage of a chunk.
///
/// - `source`: identifier of the parent document
/// - `file_name`: basename of `source`, present iff `source` is
/// - `chunk_id`: ordinal of the chunk within its ingestion run, global across documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: Option<String>,
    pub file_name: Option<String>,
    pub chunk_id: u64,
}

/// A bounded slice of a document's text, the unit that is embedded, stored and retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a vector index together with its similarity score.
///
/// Higher scores are closer matches; the exact scale depends on the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked retrieval output, best match first.
pub type RetrievalResult = Vec<ScoredChunk>;

/// Outcome of one call to an answer generator.
///
/// A reachable service that refuses the request is not a transport failure, so
/// it is reported as `ServiceError` rather than as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Generation {
    Text(String),
    ServiceError { status: u16, body: String },
}

/// Final result of a query: the generated answer and the distinct sources it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Basename of a source identifier, or the identifier itself when it has none.
pub fn file_name_of(source: &str) -> String {
    Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}
