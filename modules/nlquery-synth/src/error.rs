use ai_client::AiError;
use serde_json::{json, Value};
use thiserror::Error;

/// Everything that can stop a question from becoming a query.
///
/// Each variant suggests an HTTP-equivalent status via [`status_code`](Self::status_code):
/// 400 for caller-fixable problems, 401 when the provider rejects the key,
/// 500 otherwise.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("No question provided")]
    EmptyQuestion,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM service rejected the API key ({status})")]
    Unauthorized { status: u16, body: String },

    #[error("API call failed: {0}")]
    Transport(String),

    #[error("LLM service error: {0}")]
    Upstream(String),

    #[error("Failed to parse LLM response into valid JSON")]
    Unparseable { raw_response: String },

    #[error("LLM response is not a usable query: {reason}")]
    Malformed { reason: String, raw_response: String },

    #[error("{message}")]
    ModelReported {
        message: String,
        details: Value,
        raw_response: String,
    },
}

impl SynthesisError {
    pub fn status_code(&self) -> u16 {
        match self {
            SynthesisError::EmptyQuestion | SynthesisError::Configuration(_) => 400,
            SynthesisError::Unauthorized { .. } => 401,
            _ => 500,
        }
    }

    /// Short machine-readable class: configuration, authentication, transport, upstream, parse.
    pub fn kind(&self) -> &'static str {
        match self {
            SynthesisError::EmptyQuestion | SynthesisError::Configuration(_) => "configuration",
            SynthesisError::Unauthorized { .. } => "authentication",
            SynthesisError::Transport(_) => "transport",
            SynthesisError::Upstream(_) => "upstream",
            SynthesisError::Unparseable { .. }
            | SynthesisError::Malformed { .. }
            | SynthesisError::ModelReported { .. } => "parse",
        }
    }

    /// The model's text exactly as received, when there was one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            SynthesisError::Unparseable { raw_response }
            | SynthesisError::Malformed { raw_response, .. }
            | SynthesisError::ModelReported { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Structured diagnostics beyond the message.
    pub fn details(&self) -> Option<Value> {
        match self {
            SynthesisError::Unauthorized { status, body } => Some(json!({
                "upstream_status": status,
                "upstream_body": body,
            })),
            SynthesisError::ModelReported { details, .. } => Some(details.clone()),
            _ => None,
        }
    }
}

impl From<AiError> for SynthesisError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::MissingApiKey | AiError::InvalidApiKey => {
                SynthesisError::Configuration(err.to_string())
            }
            AiError::Unauthorized { status, body } => SynthesisError::Unauthorized { status, body },
            AiError::Timeout(_) | AiError::Transport(_) => SynthesisError::Transport(err.to_string()),
            AiError::Api { .. } | AiError::Decode(_) | AiError::EmptyCompletion => {
                SynthesisError::Upstream(err.to_string())
            }
        }
    }
}
