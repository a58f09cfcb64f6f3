//! HTTP surface: `POST /chat`, `POST /ingest`, `GET /healthz`.
//!
//! Each request runs the pipeline independently; the only shared state is the
//! read-mostly vector store behind `Arc`. Pipeline errors become a generic
//! 500 body so internals never leak to clients.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

use crate::chat::{ChatOrchestrator, ChatResponse};
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::{ChunkerConfig, IngestStats, ingest_directory};
use crate::store::VectorBackend;
use crate::types::RagError;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
    pub store: Arc<dyn VectorBackend>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub chunker: ChunkerConfig,
    pub docs_dir: Option<PathBuf>,
    pub embedding_model: String,
    pub chat_model: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    chunks: usize,
    embedding_model: String,
    chat_model: String,
}

/// Errors mapped at the HTTP boundary.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(RagError),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be blank".into()));
    }

    tracing::info!(chars = message.len(), "chat request");
    let response = state.orchestrator.answer(message).await?;
    Ok(Json(response))
}

async fn ingest(State(state): State<Arc<AppState>>) -> Result<Json<IngestStats>, ApiError> {
    let dir = state
        .docs_dir
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("no document directory configured".into()))?;

    let stats = ingest_directory(
        dir,
        &state.chunker,
        state.embeddings.as_ref(),
        state.store.as_ref(),
    )
    .await?;
    Ok(Json(stats))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<Json<Health>, ApiError> {
    let chunks = state.store.count().await?;
    Ok(Json(Health {
        status: "ok",
        chunks,
        embedding_model: state.embedding_model.clone(),
        chat_model: state.chat_model.clone(),
    }))
}

/// Builds the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/ingest", post(ingest))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Binds `addr` and serves until the process exits.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<(), RagError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("serving on http://{addr}");
    axum::serve(listener, router(state).into_make_service())
        .await
        .map_err(|err| RagError::Io(err.to_string()))
}
