//! Ingestion: turn a directory of markdown/text into stored, embedded chunks.
//!
//! The flow is deliberately simple and synchronous per document:
//!
//! * [`load_documents`] — walk a directory, read eligible files, skip
//!   unreadable ones with a warning.
//! * [`chunker`] — fixed-size sliding-window chunking.
//! * [`ingest_directory`] — compose load + chunk + embed + store, replacing
//!   each source's previous chunks so re-ingestion is idempotent.

pub mod chunker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::embeddings::EmbeddingProvider;
use crate::store::{ChunkRecord, VectorBackend};
use crate::types::RagError;

pub use chunker::{ChunkerConfig, TextChunk, chunk_id, chunk_text};

const INGESTIBLE_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// A source file read from disk, keyed by its directory-relative path.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the ingest root; used as the chunk source label.
    pub source: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Full file contents.
    pub text: String,
}

/// Result of walking an ingest directory.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<SourceDocument>,
    /// Files that matched an ingestible extension but could not be read.
    pub skipped: usize,
}

/// Per-run ingestion statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub files_ingested: usize,
    pub files_skipped: usize,
    pub chunks_written: usize,
}

/// Walks `dir` recursively and loads every markdown/text file.
///
/// Hidden directories are not descended into. Unreadable files are counted
/// and skipped rather than aborting the walk; a missing root directory is
/// still an error.
pub async fn load_documents(dir: &Path) -> Result<LoadedDocuments, RagError> {
    let mut loaded = LoadedDocuments::default();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                let hidden = path
                    .file_name()
                    .map(|name| name.to_string_lossy().starts_with('.'))
                    .unwrap_or(false);
                if !hidden {
                    pending.push(path);
                }
                continue;
            }

            let eligible = path
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_ascii_lowercase();
                    INGESTIBLE_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false);
            if !eligible {
                continue;
            }

            match fs::read_to_string(&path).await {
                Ok(text) => {
                    let source = path
                        .strip_prefix(dir)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .into_owned();
                    loaded.documents.push(SourceDocument { source, path, text });
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    loaded.skipped += 1;
                }
            }
        }
    }

    // Deterministic ingest order regardless of directory iteration order.
    loaded.documents.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(loaded)
}

/// Ingests every document under `dir`: chunk, embed, and store.
///
/// Each source's existing chunks are deleted before the fresh set is
/// inserted, so running this twice over unchanged input neither duplicates
/// chunk ids nor grows the store. Embedding or storage failure aborts the
/// run; there are no partial-failure semantics beyond what was already
/// committed for earlier documents.
pub async fn ingest_directory(
    dir: &Path,
    config: &ChunkerConfig,
    embeddings: &dyn EmbeddingProvider,
    store: &dyn VectorBackend,
) -> Result<IngestStats, RagError> {
    config.validate()?;

    let loaded = load_documents(dir).await?;
    let mut stats = IngestStats {
        files_skipped: loaded.skipped,
        ..Default::default()
    };

    for document in &loaded.documents {
        let chunks = chunk_text(&document.source, &document.text, config);
        stats.files_ingested += 1;

        store.delete_chunks_by_source(&document.source).await?;
        if chunks.is_empty() {
            continue;
        }

        let contents: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = embeddings.embed_batch(&contents).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "embedded {} of {} chunks for '{}'",
                vectors.len(),
                chunks.len(),
                document.source
            )));
        }

        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                ChunkRecord::new(
                    chunk.id.to_string(),
                    document.source.clone(),
                    chunk.sequence_index,
                    chunk.content.clone(),
                )
                .with_embedding(vector)
            })
            .collect();

        let written = records.len();
        store.insert_chunks(records).await?;
        stats.chunks_written += written;

        tracing::debug!(
            source = %document.source,
            chunks = written,
            "ingested document"
        );
    }

    tracing::info!(
        files = stats.files_ingested,
        skipped = stats.files_skipped,
        chunks = stats.chunks_written,
        "ingestion run complete"
    );
    Ok(stats)
}
