use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use ragdesk::chat::ChatOrchestrator;
use ragdesk::config::{ProviderKind, ServiceConfig};
use ragdesk::embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
use ragdesk::ingestion::ingest_directory;
use ragdesk::llm::{ChatModel, HttpChatModel, MockChatModel};
use ragdesk::server::{AppState, serve};
use ragdesk::store::{SqliteChunkStore, VectorBackend};
use ragdesk::types::RagError;

fn build_embeddings(config: &ServiceConfig) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    Ok(match config.embedding.provider {
        ProviderKind::Http => Arc::new(HttpEmbeddingProvider::new(
            config.embedding.base_url.clone(),
            config.embedding.api_key.clone(),
            config.embedding.model.clone(),
            config.embedding.dimensions,
        )?),
        ProviderKind::Mock => Arc::new(MockEmbeddingProvider::new(config.embedding.dimensions)),
    })
}

fn build_chat_model(config: &ServiceConfig) -> Result<Arc<dyn ChatModel>, RagError> {
    Ok(match config.chat.provider {
        ProviderKind::Http => Arc::new(HttpChatModel::new(
            config.chat.base_url.clone(),
            config.chat.api_key.clone(),
            config.chat.model.clone(),
        )?),
        ProviderKind::Mock => Arc::new(MockChatModel::default()),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = ServiceConfig::from_env()?;

    let embeddings = build_embeddings(&config)?;
    let chat_model = build_chat_model(&config)?;
    let store: Arc<dyn VectorBackend> = Arc::new(
        SqliteChunkStore::open(&config.db_path, embeddings.dimensions()).await?,
    );

    if config.ingest_on_startup {
        match &config.docs_dir {
            Some(dir) => {
                let stats =
                    ingest_directory(dir, &config.chunker, embeddings.as_ref(), store.as_ref())
                        .await?;
                tracing::info!(
                    files = stats.files_ingested,
                    chunks = stats.chunks_written,
                    "startup ingestion complete"
                );
            }
            None => tracing::warn!("RAGDESK_INGEST_ON_STARTUP set but no docs directory configured"),
        }
    }

    let orchestrator = ChatOrchestrator::new(
        embeddings.clone(),
        store.clone(),
        chat_model.clone(),
        config.top_k,
    );

    let state = Arc::new(AppState {
        orchestrator,
        store,
        embedding_model: embeddings.name().to_string(),
        chat_model: chat_model.name().to_string(),
        embeddings,
        chunker: config.chunker.clone(),
        docs_dir: config.docs_dir.clone(),
    });

    serve(state, config.bind_addr).await?;
    Ok(())
}
