use std::error::Error as StdError;

use thiserror::Error;

/// Failures talking to a chat-completion provider.
///
/// The variants separate "bad credential" from "provider unreachable" from
/// "provider answered but with something we cannot read", so callers can map
/// each to a different response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AiError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    #[error("Provider rejected credentials ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed provider response: {0}")]
    Decode(String),

    #[error("No completion in provider response")]
    EmptyCompletion,
}

impl AiError {
    /// True for 401/403-class rejections.
    pub fn is_auth(&self) -> bool {
        matches!(self, AiError::Unauthorized { .. })
    }

    /// True when the provider could not be reached at all (connect, DNS, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, AiError::Timeout(_) | AiError::Transport(_))
    }

    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status == 401 || status == 403 {
            AiError::Unauthorized { status, body }
        } else {
            AiError::Api { status, body }
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        let detail = error_chain(&err);
        if err.is_timeout() {
            AiError::Timeout(detail)
        } else if err.is_decode() {
            AiError::Decode(detail)
        } else {
            AiError::Transport(detail)
        }
    }
}

/// Render an error with its sources, e.g. `error sending request: connection refused`.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
