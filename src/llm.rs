//! Chat-completion clients for answer composition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// A chat-completion model: system prompt + user message in, answer text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError>;

    /// Model identifier reported back to clients in [`ChatResponse`].
    ///
    /// [`ChatResponse`]: crate::chat::ChatResponse
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| RagError::Completion(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages: vec![
                    WireMessage {
                        role: "system",
                        content: system,
                    },
                    WireMessage {
                        role: "user",
                        content: user,
                    },
                ],
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RagError::Completion(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Completion(err.to_string()))?;

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| RagError::Completion(err.to_string()))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| RagError::Completion("model returned no answer".into()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Canned-answer model for tests and offline runs.
///
/// Echoes its configured reply; keeps the last-received prompts out of scope
/// on purpose so it stays trivially `Send + Sync`.
#[derive(Clone, Debug)]
pub struct MockChatModel {
    reply: String,
}

impl MockChatModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new("mock answer")
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, RagError> {
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
