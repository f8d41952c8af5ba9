//! Error types for ragchat.
//!
//! One enum covers every failure category the pipelines can surface:
//! configuration, I/O, the three external services (LLM, embeddings,
//! vector index), knowledge-base data problems and prompt rendering.

use thiserror::Error;

/// Unified error type for ragchat.
///
/// All fallible functions return `Result<T, AppError>`. Nothing in the
/// pipelines retries on its own; the caller sees the error for the single
/// operation that failed.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration and credentials (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language-model service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding service errors, including dimension mismatches
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index service errors (unreachable, missing index, bad write)
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Document and chunking errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
