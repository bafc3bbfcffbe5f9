//! Grounded prompt construction.
//!
//! Retrieved chunks become `Document:`/`Content:` blocks in rank order, and
//! every distinct source gets one citation number.

use std::collections::BTreeSet;

use edurag_core::config::CitationOrder;
use edurag_core::types::{file_name_of, ScoredChunk};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub prompt: String,
    /// Distinct source identifiers, in citation-number order.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    order: CitationOrder,
}

impl PromptAssembler {
    pub fn new(order: CitationOrder) -> Self { Self { order } }

    pub fn assemble(&self, question: &str, retrieved: &[ScoredChunk]) -> AssembledPrompt {
        let context = retrieved
            .iter()
            .map(|hit| {
                let name = hit.chunk.metadata.file_name.as_deref().unwrap_or("Unknown");
                format!("Document: {}\nContent: {}", name, hit.chunk.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let sources = distinct_sources(retrieved, self.order);
        let citations = sources
            .iter()
            .enumerate()
            .map(|(i, source)| format!("[{}] {}", i + 1, file_name_of(source)))
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "You are an educational assistant that answers questions based on course materials.\n\
             Use the following context to answer the question, and cite your sources where possible.\n\
             \n\
             CONTEXT:\n\
             {context}\n\
             \n\
             SOURCES:\n\
             {citations}\n\
             \n\
             QUESTION:\n\
             {question}\n\
             \n\
             ANSWER:\n"
        );
        AssembledPrompt { prompt, sources }
    }
}

/// Each chunk's `source` once; chunks without a source are skipped.
pub fn distinct_sources(retrieved: &[ScoredChunk], order: CitationOrder) -> Vec<String> {
    let present = retrieved.iter().filter_map(|hit| hit.chunk.metadata.source.as_deref());
    match order {
        CitationOrder::Sorted => present.collect::<BTreeSet<_>>().into_iter().map(str::to_string).collect(),
        CitationOrder::FirstSeen => {
            let mut seen = Vec::<String>::new();
            for source in present {
                if !seen.iter().any(|s| s == source) {
                    seen.push(source.to_string());
                }
            }
            seen
        }
    }
}
