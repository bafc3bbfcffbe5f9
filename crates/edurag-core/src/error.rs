use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to load {path}: {reason}")]
    Ingestion { path: String, reason: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),

    #[error("Generation request failed: {0}")]
    Generation(String),

    #[error("Generation service returned HTTP {status}: {body}")]
    GenerationService { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;
