//! Service configuration from environment variables.
//!
//! Settings resolve in two steps (later wins):
//!
//! 1. Compiled defaults (mock providers, local SQLite file)
//! 2. Environment variables (`RAGDESK_*`), usually loaded from `.env` via
//!    `dotenvy` before [`ServiceConfig::from_env`] runs
//!
//! The defaults deliberately need no credentials: a bare `ragdesk` starts
//! with deterministic mock providers so the pipeline can be tried end to end
//! before any API keys exist.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingestion::ChunkerConfig;
use crate::types::RagError;

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was present but unparsable.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse { key: String, message: String },

    /// The resolved configuration is internally inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for RagError {
    fn from(err: ConfigError) -> Self {
        RagError::Config(err.to_string())
    }
}

/// Which implementation backs a model seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP API.
    Http,
    /// Deterministic in-process mock.
    Mock,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "http" => Ok(ProviderKind::Http),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider kind '{other}' (expected http or mock)")),
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Directory of markdown/text to ingest; `None` disables `/ingest`.
    pub docs_dir: Option<PathBuf>,
    /// Run a full ingestion pass before serving.
    pub ingest_on_startup: bool,
    /// Retrieval depth for chat requests.
    pub top_k: usize,
    pub chunker: ChunkerConfig,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().expect("static addr parses"),
            db_path: PathBuf::from("ragdesk.sqlite"),
            docs_dir: None,
            ingest_on_startup: false,
            top_k: 4,
            chunker: ChunkerConfig::default(),
            embedding: EmbeddingSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Builds configuration from `RAGDESK_*` environment variables over the
    /// compiled defaults, then validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_parse::<SocketAddr>("RAGDESK_BIND_ADDR")? {
            config.bind_addr = value;
        }
        if let Some(value) = env_opt("RAGDESK_DB_PATH") {
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = env_opt("RAGDESK_DOCS_DIR") {
            config.docs_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = env_parse::<bool>("RAGDESK_INGEST_ON_STARTUP")? {
            config.ingest_on_startup = value;
        }
        if let Some(value) = env_parse::<usize>("RAGDESK_TOP_K")? {
            config.top_k = value;
        }
        if let Some(value) = env_parse::<usize>("RAGDESK_CHUNK_CHARS")? {
            config.chunker.chunk_chars = value;
        }
        if let Some(value) = env_parse::<usize>("RAGDESK_CHUNK_OVERLAP")? {
            config.chunker.overlap_chars = value;
        }

        if let Some(value) = env_parse::<ProviderKind>("RAGDESK_EMBEDDING_PROVIDER")? {
            config.embedding.provider = value;
        }
        if let Some(value) = env_opt("RAGDESK_EMBEDDING_URL") {
            config.embedding.base_url = value;
        }
        if let Some(value) = env_opt("RAGDESK_EMBEDDING_MODEL") {
            config.embedding.model = value;
        }
        if let Some(value) = env_parse::<usize>("RAGDESK_EMBEDDING_DIMENSIONS")? {
            config.embedding.dimensions = value;
        }

        if let Some(value) = env_parse::<ProviderKind>("RAGDESK_CHAT_PROVIDER")? {
            config.chat.provider = value;
        }
        if let Some(value) = env_opt("RAGDESK_CHAT_URL") {
            config.chat.base_url = value;
        }
        if let Some(value) = env_opt("RAGDESK_CHAT_MODEL") {
            config.chat.model = value;
        }

        // One shared key, overridable per seam.
        let shared_key = env_opt("RAGDESK_API_KEY");
        config.embedding.api_key = env_opt("RAGDESK_EMBEDDING_API_KEY").or(shared_key.clone());
        config.chat.api_key = env_opt("RAGDESK_CHAT_API_KEY").or(shared_key);

        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embedding dimensions must be at least 1".into(),
            ));
        }
        self.chunker
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(())
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|err| ConfigError::EnvParse {
            key: key.to_string(),
            message: err.to_string(),
        }),
    }
}
