//! Fixed-size sliding-window chunking over source text.
//!
//! The window is measured in characters and aligned to UTF-8 boundaries so a
//! chunk never splits a code point. Chunking is deterministic: the same
//! `(source, text, config)` triple always yields the same chunks with the
//! same ids, which is what makes re-ingestion idempotent downstream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RagError;

/// Window parameters for [`chunk_text`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk size in characters.
    pub chunk_chars: usize,
    /// Characters of overlap carried between consecutive chunks.
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1200,
            overlap_chars: 200,
        }
    }
}

impl ChunkerConfig {
    /// Rejects windows that cannot advance.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_chars == 0 {
            return Err(RagError::Config("chunk_chars must be at least 1".into()));
        }
        if self.overlap_chars >= self.chunk_chars {
            return Err(RagError::Config(format!(
                "overlap_chars ({}) must be smaller than chunk_chars ({})",
                self.overlap_chars, self.chunk_chars
            )));
        }
        Ok(())
    }
}

/// A bounded slice of source text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Deterministic id derived from source, index, and content.
    pub id: Uuid,
    /// Zero-based position of this chunk within its source document.
    pub sequence_index: usize,
    /// The chunk text.
    pub content: String,
}

/// Derives a stable chunk id from its identity triple.
///
/// UUIDv5 over `source \n index \n content` means identical input always maps
/// to the same id, so re-ingesting an unchanged document reproduces the
/// previous id set exactly.
pub fn chunk_id(source: &str, sequence_index: usize, content: &str) -> Uuid {
    let name = format!("{source}\n{sequence_index}\n{content}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Splits `text` into fixed-size overlapping chunks.
///
/// The final chunk may be shorter than `chunk_chars`; whitespace-only windows
/// are dropped without consuming a sequence index. Empty input yields no
/// chunks. Callers are expected to have validated `config` first; an
/// unvalidated overlap still cannot stall the loop because the step is
/// clamped to at least one character.
pub fn chunk_text(source: &str, text: &str, config: &ChunkerConfig) -> Vec<TextChunk> {
    let step = config
        .chunk_chars
        .saturating_sub(config.overlap_chars)
        .max(1);

    // Byte offset of every char boundary, with the end sentinel, so windows
    // can slice without re-walking the string.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut sequence_index = 0usize;

    while start < total_chars {
        let end = (start + config.chunk_chars).min(total_chars);
        let window = &text[boundaries[start]..boundaries[end]];
        if !window.trim().is_empty() {
            chunks.push(TextChunk {
                id: chunk_id(source, sequence_index, window),
                sequence_index,
                content: window.to_string(),
            });
            sequence_index += 1;
        }
        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_chars: usize, overlap_chars: usize) -> ChunkerConfig {
        ChunkerConfig {
            chunk_chars,
            overlap_chars,
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("doc.md", "", &config(10, 2)).is_empty());
        assert!(chunk_text("doc.md", "   \n\t  ", &config(10, 2)).is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = chunk_text("doc.md", "hello world", &config(100, 10));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunk_text("doc.md", text, &config(10, 4));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].content.chars().rev().take(4).collect();
            let next_head: String = pair[1].content.chars().take(4).collect();
            let prev_tail: String = prev_tail.chars().rev().collect();
            assert_eq!(prev_tail, next_head, "overlap must carry over verbatim");
        }
    }

    #[test]
    fn windows_respect_utf8_boundaries() {
        let text = "日本語のテキストを分割します。".repeat(20);
        let chunks = chunk_text("doc.md", &text, &config(7, 3));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 7);
        }
        // Reassembly check: stepping by chunk_chars - overlap must cover the
        // full text, so the last chunk ends where the input ends.
        assert!(text.ends_with(chunks.last().unwrap().content.as_str()));
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "one two three four five six seven eight nine ten".repeat(8);
        let first = chunk_text("doc.md", &text, &config(40, 10));
        let second = chunk_text("doc.md", &text, &config(40, 10));
        assert_eq!(first, second);
    }

    #[test]
    fn ids_differ_by_source_and_index() {
        let a = chunk_id("a.md", 0, "same text");
        let b = chunk_id("b.md", 0, "same text");
        let c = chunk_id("a.md", 1, "same text");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, chunk_id("a.md", 0, "same text"));
    }

    #[test]
    fn validation_rejects_bad_windows() {
        assert!(config(0, 0).validate().is_err());
        assert!(config(10, 10).validate().is_err());
        assert!(config(10, 11).validate().is_err());
        assert!(config(10, 9).validate().is_ok());
    }
}
