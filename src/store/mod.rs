//! Storage backends for chunk documents and their embeddings.
//!
//! A single [`VectorBackend`] trait abstracts the vector store so the rest of
//! the pipeline never touches a concrete database:
//!
//! ```text
//!                   ┌──────────────────┐
//!                   │  VectorBackend   │
//!                   │   (async CRUD)   │
//!                   └────────┬─────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!       ┌─────────────┐            ┌─────────────┐
//!       │   SQLite    │            │  (future)   │
//!       │ sqlite-vec  │            │  pgvector   │
//!       └─────────────┘            └─────────────┘
//! ```
//!
//! The backend owns no indexing logic of its own; nearest-neighbour ranking
//! is delegated entirely to the underlying store.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteChunkStore;

/// A chunk with its embedding, ready for storage.
///
/// Backend-agnostic: concrete stores convert this into whatever row shape
/// they persist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this chunk.
    pub id: String,
    /// Source path the chunk was cut from.
    pub source: String,
    /// Zero-based index of this chunk within the source.
    pub sequence_index: usize,
    /// The actual text content.
    pub content: String,
    /// Additional metadata as JSON.
    pub metadata: serde_json::Value,
    /// The embedding vector, if computed.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    /// Creates a record with empty metadata and no embedding.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        sequence_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            sequence_index,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attaches the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Unified interface over chunk storage backends.
///
/// Every stored chunk carries exactly one embedding; inserting a record
/// without one is an error. Embeddings are never updated in place — callers
/// replace a source's chunks wholesale via [`delete_chunks_by_source`]
/// followed by [`insert_chunks`].
///
/// [`delete_chunks_by_source`]: VectorBackend::delete_chunks_by_source
/// [`insert_chunks`]: VectorBackend::insert_chunks
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Inserts chunk records along with their embeddings.
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), RagError>;

    /// Retrieves all chunks cut from the given source, in sequence order.
    async fn get_chunks_by_source(&self, source: &str) -> Result<Vec<ChunkRecord>, RagError>;

    /// Retrieves a specific chunk by its id.
    async fn get_chunk_by_id(&self, id: &str) -> Result<Option<ChunkRecord>, RagError>;

    /// Deletes all chunks cut from the given source, returning how many were removed.
    async fn delete_chunks_by_source(&self, source: &str) -> Result<usize, RagError>;

    /// Nearest-neighbour search by cosine similarity.
    ///
    /// Returns at most `top_k` `(chunk, similarity)` pairs, most similar
    /// first. Never returns more rows than the store holds.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError>;

    /// Total number of chunks in the store.
    async fn count(&self) -> Result<usize, RagError>;
}
