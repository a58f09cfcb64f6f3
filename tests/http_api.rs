//! Router-level tests: the chat endpoint round-trip, input validation, and
//! the generic error mapping, all with mock providers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tempfile::TempDir;
use tower::ServiceExt;

use ragdesk::chat::{ChatOrchestrator, ChatResponse};
use ragdesk::embeddings::MockEmbeddingProvider;
use ragdesk::ingestion::{ChunkerConfig, ingest_directory};
use ragdesk::llm::MockChatModel;
use ragdesk::server::{AppState, router};
use ragdesk::store::{ChunkRecord, SqliteChunkStore, VectorBackend};
use ragdesk::types::RagError;

const DIMENSIONS: usize = 16;

fn write_docs(dir: &Path) {
    std::fs::write(
        dir.join("oncall.md"),
        "# On-call guide\n\nAcknowledge the page within five minutes. Escalate to the \
         secondary if the dashboard shows sustained error-budget burn.",
    )
    .unwrap();
    std::fs::write(
        dir.join("deploys.md"),
        "# Deploys\n\nAll production deploys go through the pipeline. Manual kubectl \
         applies are reserved for sev-1 incident response only.",
    )
    .unwrap();
}

async fn build_state(docs_dir: Option<&Path>) -> Arc<AppState> {
    let embeddings = Arc::new(MockEmbeddingProvider::new(DIMENSIONS));
    let chat_model = Arc::new(MockChatModel::new("grounded mock answer"));
    let store: Arc<dyn VectorBackend> =
        Arc::new(SqliteChunkStore::open_in_memory(DIMENSIONS).await.unwrap());
    let chunker = ChunkerConfig {
        chunk_chars: 80,
        overlap_chars: 16,
    };

    if let Some(dir) = docs_dir {
        ingest_directory(dir, &chunker, embeddings.as_ref(), store.as_ref())
            .await
            .unwrap();
    }

    let orchestrator =
        ChatOrchestrator::new(embeddings.clone(), store.clone(), chat_model.clone(), 3);

    Arc::new(AppState {
        orchestrator,
        store,
        embedding_model: "mock".to_string(),
        chat_model: "mock".to_string(),
        embeddings,
        chunker,
        docs_dir: docs_dir.map(|dir| dir.to_path_buf()),
    })
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn chat_round_trip_returns_answer_and_citations() {
    let dir = TempDir::new().unwrap();
    write_docs(dir.path());
    let app = router(build_state(Some(dir.path())).await);

    let response = app
        .oneshot(json_request(
            "/chat",
            serde_json::json!({ "message": "when may I run kubectl by hand?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: ChatResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(parsed.answer, "grounded mock answer");
    assert_eq!(parsed.model, "mock");
    assert!(!parsed.citations.is_empty());
    assert!(parsed.citations.len() <= 3);
    for citation in &parsed.citations {
        assert!(!citation.chunk_id.is_empty());
        assert!(citation.source.ends_with(".md"));
    }
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_docs(dir.path());
    let app = router(build_state(Some(dir.path())).await);

    let response = app
        .oneshot(json_request("/chat", serde_json::json!({ "message": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "message must not be blank");
}

#[tokio::test]
async fn chat_on_empty_store_still_answers_without_citations() {
    let app = router(build_state(None).await);

    let response = app
        .oneshot(json_request(
            "/chat",
            serde_json::json!({ "message": "anything at all" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: ChatResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(parsed.citations.is_empty());
}

#[tokio::test]
async fn healthz_reports_chunk_count_and_models() {
    let dir = TempDir::new().unwrap();
    write_docs(dir.path());
    let state = build_state(Some(dir.path())).await;
    let expected_chunks = state.store.count().await.unwrap();
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunks"], expected_chunks as u64);
    assert_eq!(body["embedding_model"], "mock");
    assert_eq!(body["chat_model"], "mock");
}

#[tokio::test]
async fn ingest_endpoint_reruns_ingestion() {
    let dir = TempDir::new().unwrap();
    write_docs(dir.path());
    let state = build_state(Some(dir.path())).await;
    let before = state.store.count().await.unwrap();
    let app = router(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["files_ingested"], 2);
    assert_eq!(body["chunks_written"], before as u64, "idempotent re-ingest");
    assert_eq!(state.store.count().await.unwrap(), before);
}

#[tokio::test]
async fn ingest_without_docs_dir_is_rejected() {
    let app = router(build_state(None).await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "no document directory configured");
}

/// Backend whose searches always fail, for exercising the 500 mapping.
struct BrokenBackend;

#[async_trait]
impl VectorBackend for BrokenBackend {
    async fn insert_chunks(&self, _chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        Err(RagError::Storage("disk on fire".into()))
    }

    async fn get_chunks_by_source(&self, _source: &str) -> Result<Vec<ChunkRecord>, RagError> {
        Err(RagError::Storage("disk on fire".into()))
    }

    async fn get_chunk_by_id(&self, _id: &str) -> Result<Option<ChunkRecord>, RagError> {
        Err(RagError::Storage("disk on fire".into()))
    }

    async fn delete_chunks_by_source(&self, _source: &str) -> Result<usize, RagError> {
        Err(RagError::Storage("disk on fire".into()))
    }

    async fn search_similar(
        &self,
        _query_embedding: &[f32],
        _top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError> {
        Err(RagError::Storage("disk on fire".into()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        Err(RagError::Storage("disk on fire".into()))
    }
}

#[tokio::test]
async fn pipeline_failure_maps_to_generic_500() {
    let embeddings = Arc::new(MockEmbeddingProvider::new(DIMENSIONS));
    let store: Arc<dyn VectorBackend> = Arc::new(BrokenBackend);
    let orchestrator = ChatOrchestrator::new(
        embeddings.clone(),
        store.clone(),
        Arc::new(MockChatModel::default()),
        3,
    );
    let app = router(Arc::new(AppState {
        orchestrator,
        store,
        embedding_model: "mock".to_string(),
        chat_model: "mock".to_string(),
        embeddings,
        chunker: ChunkerConfig::default(),
        docs_dir: None,
    }));

    let response = app
        .oneshot(json_request(
            "/chat",
            serde_json::json!({ "message": "does this fail cleanly?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "internal error", "no internals leaked");
}
