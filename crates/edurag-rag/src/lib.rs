pub mod ingest;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;

pub use ingest::{index_chunks, prepare_chunks, IngestReport};
pub use orchestrator::{ensure_db_exists, QueryOrchestrator};
pub use prompt::{AssembledPrompt, PromptAssembler};
pub use retriever::Retriever;
