//! Embedding providers: the trait seam plus the HTTP and mock implementations.
//!
//! [`HttpEmbeddingProvider`] speaks the OpenAI-compatible `/embeddings` wire
//! format, which covers OpenAI itself, Ollama, and most local inference
//! servers. [`MockEmbeddingProvider`] produces deterministic vectors so the
//! pipeline can be exercised without a model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// Converts text to fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of inputs, returning one vector per input in order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Human-readable provider identifier for logs and health reporting.
    fn name(&self) -> &str;

    /// Length of every vector this provider produces.
    fn dimensions(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Deserialize)]
struct EmbeddingObject {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedding client.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: inputs,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        if payload.data.len() != inputs.len() {
            return Err(RagError::Embedding(format!(
                "requested {} embeddings, got {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        let mut data = payload.data;
        data.sort_by_key(|object| object.index);

        let mut vectors = Vec::with_capacity(data.len());
        for object in data {
            if object.embedding.len() != self.dimensions {
                return Err(RagError::Embedding(format!(
                    "embedding has {} dimensions, expected {}",
                    object.embedding.len(),
                    self.dimensions
                )));
            }
            vectors.push(object.embedding);
        }
        Ok(vectors)
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Vectors are derived from a hash of the input text and normalized to unit
/// length: the same text always maps to the same vector, different texts map
/// to different vectors with overwhelming probability.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, input: &str) -> Vec<f32> {
        // FNV-1a seeds a splitmix-style generator; no RNG crate needed for
        // a test double.
        let mut state = fnv1a(input.as_bytes());
        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add(0x2545_F491_4F6C_DD1D);
            let mixed = state ^ (state >> 31);
            // Map to [-1, 1].
            vector.push(((mixed >> 11) as f32 / (1u64 << 53) as f32) * 2.0 - 1.0);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut vector {
                *value /= norm;
            }
        } else if let Some(first) = vector.first_mut() {
            *first = 1.0;
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(16)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xCBF2_9CE4_8422_2325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs.iter().map(|input| self.embed_one(input)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new(16);
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second, "mock embeddings should be deterministic");
        assert_eq!(first[0], first[2], "identical text, identical embedding");
        assert_ne!(first[0], first[1], "different text, different embedding");
    }

    #[tokio::test]
    async fn mock_embeddings_are_unit_length() {
        let provider = MockEmbeddingProvider::new(8);
        let vectors = provider
            .embed_batch(&["some text".to_string()])
            .await
            .unwrap();
        let norm = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
        assert_eq!(vectors[0].len(), provider.dimensions());
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let provider = MockEmbeddingProvider::default();
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
