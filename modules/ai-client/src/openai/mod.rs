mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AiError;
use crate::traits::{ChatModel, CompletionRequest};

use client::OpenAiClient;
use types::{ChatRequest, WireMessage};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// OpenAi Agent
// =============================================================================

/// Chat agent for any OpenAI-compatible `/chat/completions` endpoint.
///
/// Groq, OpenRouter and self-hosted gateways speak the same wire format, so
/// pointing `base_url` elsewhere is all that is needed.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: Option<String>,
    pub(crate) model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAi {
    /// A `None` or blank key is kept as "no credential"; requests then fail
    /// with [`AiError::MissingApiKey`] without touching the network.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<OpenAiClient, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        OpenAiClient::new(api_key, &self.base_url, self.timeout)
    }

    /// Simple chat completion (convenience method).
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String, AiError> {
        self.complete(CompletionRequest::new().system(system).user(user))
            .await
    }
}

// =============================================================================
// ChatModel Implementation
// =============================================================================

#[async_trait]
impl ChatModel for OpenAi {
    fn model(&self) -> &str {
        &self.model
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError> {
        let client = self.client()?;

        let wire = request
            .messages
            .iter()
            .map(WireMessage::from)
            .fold(ChatRequest::new(&self.model), |req, msg| req.message(msg))
            .temperature(request.temperature);

        let response = client.chat(&wire).await?;
        let content = response.first_content().ok_or(AiError::EmptyCompletion)?;

        debug!(model = %self.model, bytes = content.len(), "Chat completion received");
        Ok(content)
    }
}
