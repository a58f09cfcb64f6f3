//! Chat orchestration: embed the query, retrieve context, compose an answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingProvider;
use crate::llm::ChatModel;
use crate::store::{ChunkRecord, VectorBackend};
use crate::types::RagError;

const GROUNDED_SYSTEM_PROMPT: &str = "You are a knowledge-base assistant. Answer the user's \
question using only the numbered context excerpts below. Cite excerpts by their number, and say \
so plainly when the context does not cover the question.";

const UNGROUNDED_SYSTEM_PROMPT: &str = "You are a knowledge-base assistant. No reference \
material was retrieved for this question; answer from general knowledge and make clear that the \
answer is not grounded in the knowledge base.";

/// Where an answer excerpt came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub source: String,
    pub sequence_index: usize,
    /// Cosine similarity between the query and the cited chunk.
    pub score: f32,
}

/// The answer returned to the caller. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub model: String,
}

/// Single request/response RAG flow.
///
/// Embed the query, fetch the top-k nearest chunks, assemble a grounded
/// prompt, call the model. No retries, no backpressure, no session state
/// beyond the single request.
#[derive(Clone)]
pub struct ChatOrchestrator {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorBackend>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl ChatOrchestrator {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorBackend>,
        model: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            embeddings,
            store,
            model,
            top_k,
        }
    }

    /// Answers `message` grounded in the stored knowledge base.
    pub async fn answer(&self, message: &str) -> Result<ChatResponse, RagError> {
        let query = vec![message.to_string()];
        let mut vectors = self.embeddings.embed_batch(&query).await?;
        let query_embedding = vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("provider returned no query embedding".into()))?;

        let hits = self
            .store
            .search_similar(&query_embedding, self.top_k)
            .await?;
        tracing::debug!(hits = hits.len(), top_k = self.top_k, "retrieved context");

        let (system, user) = build_prompt(message, &hits);
        let answer = self.model.complete(&system, &user).await?;

        let citations = hits
            .into_iter()
            .map(|(chunk, score)| Citation {
                chunk_id: chunk.id,
                source: chunk.source,
                sequence_index: chunk.sequence_index,
                score,
            })
            .collect();

        Ok(ChatResponse {
            answer,
            citations,
            model: self.model.name().to_string(),
        })
    }
}

/// Assembles the system and user prompts from retrieved context.
///
/// Context excerpts are numbered from 1 and labelled with their source path
/// and chunk position so the model can cite them.
fn build_prompt(message: &str, hits: &[(ChunkRecord, f32)]) -> (String, String) {
    if hits.is_empty() {
        return (UNGROUNDED_SYSTEM_PROMPT.to_string(), message.to_string());
    }

    let mut system = String::from(GROUNDED_SYSTEM_PROMPT);
    system.push_str("\n\nContext:\n");
    for (number, (chunk, _)) in hits.iter().enumerate() {
        system.push_str(&format!(
            "\n[{}] ({} #{})\n{}\n",
            number + 1,
            chunk.source,
            chunk.sequence_index,
            chunk.content.trim()
        ));
    }

    (system, message.to_string())
}
