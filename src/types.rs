//! Shared error type for the RAG pipeline.

use thiserror::Error;

/// Errors surfaced by ingestion, embedding, storage, and chat composition.
///
/// Foreign errors are flattened to strings at the boundary where they occur;
/// callers propagate with `?` and the HTTP layer converts whatever reaches it
/// into a generic error response.
#[derive(Debug, Error)]
pub enum RagError {
    /// Filesystem or network I/O failure.
    #[error("i/o failure: {0}")]
    Io(String),

    /// Invalid or unparsable service configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The embedding model returned an error or malformed payload.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// Vector store operation failed.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The chat completion endpoint returned an error or empty answer.
    #[error("chat completion failed: {0}")]
    Completion(String),
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}
