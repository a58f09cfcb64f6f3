//! ragdesk: retrieval-augmented chat over a markdown knowledge base.
//!
//! ```text
//! docs dir ──► ingestion::load_documents ──► ingestion::chunk_text
//!                                                   │
//!                     embeddings::EmbeddingProvider ◄┘ (one vector per chunk)
//!                                 │
//!                                 ▼
//!                 store::SqliteChunkStore (sqlite-vec)
//!                                 │
//! POST /chat ──► chat::ChatOrchestrator ──► top-k retrieval ──► llm::ChatModel
//!                                 │
//!                                 └──► answer + citations (JSON)
//! ```
//!
//! The pipeline is a thin composition: fixed-size sliding-window chunking,
//! an OpenAI-compatible embedding/chat client, and cosine top-k retrieval
//! delegated to sqlite-vec. Mock providers make the whole flow runnable and
//! testable without any external service.

pub mod chat;
pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod llm;
pub mod server;
pub mod store;
pub mod types;

pub use chat::{ChatOrchestrator, ChatResponse, Citation};
pub use config::{ConfigError, ProviderKind, ServiceConfig};
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use ingestion::{ChunkerConfig, IngestStats, chunk_text, ingest_directory, load_documents};
pub use llm::{ChatModel, HttpChatModel, MockChatModel};
pub use store::{ChunkRecord, SqliteChunkStore, VectorBackend};
pub use types::RagError;
