use std::sync::Arc;

use tracing::{debug, info, warn};

use ai_client::util::truncate_to_char_boundary;
use ai_client::{ChatModel, CompletionRequest, OpenAi};
use nlquery_common::{Config, NlQueryError, StructuredQuery, DEFAULT_LLM_TEMPERATURE};
use nlquery_store::DocumentStore;

use crate::context::ContextBuilder;
use crate::error::SynthesisError;
use crate::extract;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::shortcuts::{self, Shortcut};

const LOG_PREVIEW_BYTES: usize = 200;

/// Turns a question into a [`StructuredQuery`].
///
/// Holds no per-request state; one instance can serve concurrent callers.
#[derive(Clone)]
pub struct QuerySynthesizer {
    model: Arc<dyn ChatModel>,
    context: ContextBuilder,
    shortcuts: Vec<Shortcut>,
    temperature: f32,
}

impl QuerySynthesizer {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            model,
            context: ContextBuilder::new(store),
            shortcuts: shortcuts::BUILTIN.to_vec(),
            temperature: DEFAULT_LLM_TEMPERATURE,
        }
    }

    /// Wire an OpenAI-compatible provider from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        let model = OpenAi::new(config.llm_api_key.clone(), &config.llm_model)
            .with_base_url(&config.llm_api_url)
            .with_timeout(config.llm_timeout);
        Self::new(Arc::new(model), store).with_temperature(config.llm_temperature)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Append a shortcut; built-ins are checked first.
    pub fn with_shortcut(mut self, shortcut: Shortcut) -> Self {
        self.shortcuts.push(shortcut);
        self
    }

    /// Translate one question. Every failure comes back as a [`SynthesisError`].
    pub async fn translate(&self, question: &str) -> Result<StructuredQuery, SynthesisError> {
        if question.trim().is_empty() {
            return Err(SynthesisError::EmptyQuestion);
        }

        if let Some((name, query)) = shortcuts::lookup(&self.shortcuts, question) {
            info!(shortcut = name, "Answered from shortcut table");
            return Ok(query);
        }

        let schema = self.context.build().await;
        let prompt = build_prompt(&schema, question);

        if !self.model.has_credential() {
            warn!("LLM API key is not configured");
            return Err(SynthesisError::Configuration(
                "LLM API key is not configured".to_string(),
            ));
        }

        let request = CompletionRequest::new()
            .system(SYSTEM_PROMPT)
            .user(prompt)
            .temperature(self.temperature);

        let raw = self.model.complete(request).await.map_err(|e| {
            warn!(error = %e, model = %self.model.model(), "LLM call failed");
            SynthesisError::from(e)
        })?;

        recover(question, &raw)
    }
}

/// Extraction stages, then the question-based fallback, then a parse error.
fn recover(question: &str, raw: &str) -> Result<StructuredQuery, SynthesisError> {
    if let Some((stage, doc)) = extract::extract_object(raw) {
        debug!(stage, "Recovered JSON from LLM response");
        return StructuredQuery::from_document(doc).map_err(|e| match e {
            NlQueryError::ModelReported { message, details } => SynthesisError::ModelReported {
                message,
                details,
                raw_response: raw.to_string(),
            },
            other => SynthesisError::Malformed {
                reason: other.to_string(),
                raw_response: raw.to_string(),
            },
        });
    }

    if shortcuts::mentions_average_age(question) {
        info!("Unparseable response; falling back to average-age query");
        return Ok(shortcuts::average_age_query());
    }

    warn!(
        preview = %truncate_to_char_boundary(raw, LOG_PREVIEW_BYTES),
        "Failed to parse LLM response"
    );
    Err(SynthesisError::Unparseable {
        raw_response: raw.to_string(),
    })
}
