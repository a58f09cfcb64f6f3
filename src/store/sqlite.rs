//! SQLite backend with vector search via the `sqlite-vec` extension.
//!
//! Chunks live in a plain `chunks` table; their embeddings live in a `vec0`
//! virtual table keyed by the chunk's rowid. Similarity search uses
//! `vec_distance_cosine` and reports `1 - distance` so callers see a
//! similarity score where higher is closer.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use super::{ChunkRecord, VectorBackend};
use crate::types::RagError;

/// Chunk store backed by SQLite + sqlite-vec.
#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
    dimensions: usize,
}

impl SqliteChunkStore {
    /// Opens (or creates) a store at `path` for vectors of `dimensions` length.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::init(conn, dimensions).await
    }

    /// Opens an in-memory store, mainly for tests.
    pub async fn open_in_memory(dimensions: usize) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::init(conn, dimensions).await
    }

    async fn init(conn: Connection, dimensions: usize) -> Result<Self, RagError> {
        if dimensions == 0 {
            return Err(RagError::Config(
                "embedding dimensions must be at least 1".into(),
            ));
        }

        // Probe the extension before issuing any vec0 DDL so a broken
        // registration fails with a readable error.
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        conn.call(move |conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT PRIMARY KEY,
                    source TEXT NOT NULL,
                    sequence_index INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    metadata TEXT NOT NULL DEFAULT '{}'
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
                [],
            )?;
            conn.execute(
                &format!(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_embeddings \
                     USING vec0(embedding float[{dimensions}])"
                ),
                [],
            )?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self { conn, dimensions })
    }

    /// Vector length this store was opened with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Underlying connection, for queries the trait does not cover.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(RagError::Storage)
    }
}

#[async_trait]
impl VectorBackend for SqliteChunkStore {
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let dimensions = self.dimensions;
        let mut rows = Vec::with_capacity(chunks.len());
        for record in chunks {
            let Some(embedding) = record.embedding.clone() else {
                return Err(RagError::Storage(format!(
                    "chunk '{}' has no embedding",
                    record.id
                )));
            };
            if embedding.len() != dimensions {
                return Err(RagError::Storage(format!(
                    "chunk '{}' embedding has {} dimensions, store expects {}",
                    record.id,
                    embedding.len(),
                    dimensions
                )));
            }
            let vector_json = serde_json::to_string(&embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((record, vector_json));
        }

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (record, vector_json) in rows {
                    tx.execute(
                        "INSERT INTO chunks (id, source, sequence_index, content, metadata) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        (
                            record.id,
                            record.source,
                            record.sequence_index as i64,
                            record.content,
                            record.metadata.to_string(),
                        ),
                    )?;
                    let rowid = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO chunks_embeddings (rowid, embedding) VALUES (?1, ?2)",
                        (rowid, vector_json),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn get_chunks_by_source(&self, source: &str) -> Result<Vec<ChunkRecord>, RagError> {
        let source = source.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source, sequence_index, content, metadata \
                     FROM chunks WHERE source = ?1 ORDER BY sequence_index",
                )?;
                let rows = stmt.query_map([&source], |row| {
                    Ok(ChunkRecord {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        sequence_index: row.get::<_, i64>(2)? as usize,
                        content: row.get(3)?,
                        metadata: row
                            .get::<_, String>(4)
                            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                            .unwrap_or_default(),
                        embedding: None,
                    })
                })?;
                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn get_chunk_by_id(&self, id: &str) -> Result<Option<ChunkRecord>, RagError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source, sequence_index, content, metadata \
                     FROM chunks WHERE id = ?1",
                )?;
                let result = stmt
                    .query_row([&id], |row| {
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            sequence_index: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                            metadata: row
                                .get::<_, String>(4)
                                .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                                .unwrap_or_default(),
                            embedding: None,
                        })
                    })
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn delete_chunks_by_source(&self, source: &str) -> Result<usize, RagError> {
        let source = source.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                // Embeddings first, while the chunk rowids still resolve.
                tx.execute(
                    "DELETE FROM chunks_embeddings WHERE rowid IN \
                     (SELECT rowid FROM chunks WHERE source = ?1)",
                    [&source],
                )?;
                let deleted = tx.execute("DELETE FROM chunks WHERE source = ?1", [&source])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if query_embedding.len() != self.dimensions {
            return Err(RagError::Storage(format!(
                "query embedding has {} dimensions, store expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| RagError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT c.id, c.source, c.sequence_index, c.content, c.metadata, \
                     vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                     FROM chunks c \
                     JOIN chunks_embeddings e ON e.rowid = c.rowid \
                     ORDER BY distance ASC \
                     LIMIT {top_k}"
                ))?;

                let rows = stmt.query_map([&embedding_json], |row| {
                    let record = ChunkRecord {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        sequence_index: row.get::<_, i64>(2)? as usize,
                        content: row.get(3)?,
                        metadata: row
                            .get::<_, String>(4)
                            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                            .unwrap_or_default(),
                        embedding: None,
                    };
                    let distance: f32 = row.get(5)?;
                    // Cosine distance to similarity.
                    Ok((record, 1.0 - distance))
                })?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}
