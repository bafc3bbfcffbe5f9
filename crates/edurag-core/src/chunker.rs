//! Recursive character splitter.
//!
//! Text is cut at the coarsest separator present (paragraph, line, sentence
//! stop, space, then single characters), pieces are packed greedily up to
//! `chunk_size` characters, and each new chunk re-uses up to `chunk_overlap`
//! characters from the tail of the previous one. Lengths are counted in chars.

use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{file_name_of, Chunk, ChunkMetadata, Document};

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    strip_whitespace: bool,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Fails with `Error::Configuration` unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            strip_whitespace: config.strip_whitespace,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list, coarsest first. Without a trailing `""` a unit
    /// longer than `chunk_size` may survive the finest separator and is kept whole.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document in order and stamp `file_name` and the run-wide `chunk_id`.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            let pieces = self.split_text(&doc.content);
            debug!(source = %doc.source, chunks = pieces.len(), "split document");
            chunks.extend(pieces.into_iter().map(|content| Chunk {
                content,
                metadata: ChunkMetadata { source: Some(doc.source.clone()), file_name: None, chunk_id: 0 },
            }));
        }
        stamp_metadata(&mut chunks);
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = choose_separator(text, separators);
        let mut final_chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }
            if finer.is_empty() {
                final_chunks.push(piece.to_string());
            } else {
                final_chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }
        final_chunks
    }

    /// Pack consecutive pieces into windows of at most `chunk_size` chars. After a
    /// window is emitted, pieces are dropped from its front until what remains fits
    /// the overlap budget and leaves room for the next piece.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;
        for &piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(total, chunk_size = self.chunk_size, "created a chunk longer than chunk_size");
                }
                if !window.is_empty() {
                    if let Some(doc) = self.join_window(&window) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match window.pop_front() {
                            Some(first) => total -= char_len(first),
                            None => break,
                        }
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        if let Some(doc) = self.join_window(&window) {
            docs.push(doc);
        }
        docs
    }

    fn join_window(&self, window: &VecDeque<&str>) -> Option<String> {
        let joined: String = window.iter().copied().collect();
        let text = if self.strip_whitespace { joined.trim().to_string() } else { joined };
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Split a batch of documents with the given parameters. Validation happens
/// before any text is touched.
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let splitter = RecursiveSplitter::new(config)?;
    Ok(splitter.split_documents(documents))
}

/// Assign `file_name` from `source` and number chunks in emission order.
fn stamp_metadata(chunks: &mut [Chunk]) {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.metadata.file_name = chunk.metadata.source.as_deref().map(file_name_of);
        chunk.metadata.chunk_id = i as u64;
    }
}

/// First separator that is empty or occurs in `text`, plus the finer separators after it.
fn choose_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep.as_str()) {
            return (sep, &separators[i + 1..]);
        }
    }
    (separators.last().map(String::as_str).unwrap_or(""), &[])
}

/// Cut `text` before every occurrence of `separator`, so each piece after the
/// first starts with the separator. An empty separator yields single characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
