//! Retrieve, assemble, generate.

use std::path::Path;
use tracing::{info, warn};

use edurag_core::config::QueryConfig;
use edurag_core::error::{Error, Result};
use edurag_core::traits::{AnswerGenerator, Embedder, VectorIndex};
use edurag_core::types::{Generation, RagAnswer};
use edurag_vector::LanceVectorStore;

use crate::prompt::{AssembledPrompt, PromptAssembler};
use crate::retriever::Retriever;

pub struct QueryOrchestrator<V: VectorIndex> {
    retriever: Retriever<V>,
    assembler: PromptAssembler,
    generator: Box<dyn AnswerGenerator>,
    config: QueryConfig,
}

impl<V: VectorIndex> QueryOrchestrator<V> {
    pub fn new(config: QueryConfig, retriever: Retriever<V>, generator: Box<dyn AnswerGenerator>) -> Result<Self> {
        config.validate()?;
        let assembler = PromptAssembler::new(config.citation_order);
        Ok(Self { retriever, assembler, generator, config })
    }

    pub fn config(&self) -> &QueryConfig { &self.config }

    pub fn retriever(&self) -> &Retriever<V> { &self.retriever }

    /// Answer with the configured model and `top_k`.
    pub fn ask(&self, query: &str) -> Result<RagAnswer> {
        self.answer(query, &self.config.model, self.config.top_k)
    }

    /// Retrieval or transport failures are errors, never empty answers. A
    /// non-success reply from the service becomes `Error: <body>` when
    /// `fold_service_errors` is set and `Error::GenerationService` otherwise.
    pub fn answer(&self, query: &str, model: &str, top_k: usize) -> Result<RagAnswer> {
        let retrieved = self.retriever.retrieve(query, top_k)?;
        let AssembledPrompt { prompt, sources } = self.assembler.assemble(query, &retrieved);
        info!(model, chunks = retrieved.len(), sources = sources.len(), "generating answer");

        let generation = self
            .generator
            .generate(&prompt, model)
            .map_err(|e| Error::Generation(format!("{e:#}")))?;
        let answer = match generation {
            Generation::Text(text) => text,
            Generation::ServiceError { status, body } => {
                warn!(status, model, "generation service returned an error");
                if !self.config.fold_service_errors {
                    return Err(Error::GenerationService { status, body });
                }
                format!("Error: {}", body)
            }
        };
        Ok(RagAnswer { answer, sources })
    }
}

impl QueryOrchestrator<LanceVectorStore> {
    /// Open the persisted store at `db_path`. A missing directory is reported
    /// before the embedder, the store or the generator is touched.
    pub fn open(
        db_path: &Path,
        table: &str,
        config: QueryConfig,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn AnswerGenerator>,
    ) -> Result<Self> {
        ensure_db_exists(db_path)?;
        config.validate()?;
        let store = LanceVectorStore::open(db_path, table, embedder.dim())
            .map_err(|e| Error::Retrieval(format!("opening vector store: {e:#}")))?;
        Self::new(config, Retriever::new(store, embedder), generator)
    }
}

pub fn ensure_db_exists(db_path: &Path) -> Result<()> {
    if db_path.is_dir() {
        return Ok(());
    }
    Err(Error::Configuration(format!(
        "Vector database at {} does not exist. Process documents first.",
        db_path.display()
    )))
}
