use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::NlQueryError;

pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.1;

/// Application configuration loaded from environment variables.
///
/// Nothing is required: a missing API key is a valid state that the
/// synthesizer reports per request instead of refusing to start.
#[derive(Clone)]
pub struct Config {
    // LLM provider
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub llm_temperature: f32,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, NlQueryError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, NlQueryError> {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let llm_api_key = non_blank("LLM_API_KEY").or_else(|| non_blank("GROQ_API_KEY"));

        let llm_timeout = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        };

        let llm_temperature = match lookup("LLM_TEMPERATURE") {
            Some(raw) => parse_var("LLM_TEMPERATURE", &raw)?,
            None => DEFAULT_LLM_TEMPERATURE,
        };

        Ok(Self {
            llm_api_key,
            llm_api_url: lookup("LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_timeout,
            llm_temperature,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            llm_temperature: DEFAULT_LLM_TEMPERATURE,
        }
    }
}

// Keep the key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<redacted>"))
            .field("llm_api_url", &self.llm_api_url)
            .field("llm_model", &self.llm_model)
            .field("llm_timeout", &self.llm_timeout)
            .field("llm_temperature", &self.llm_temperature)
            .finish()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, NlQueryError> {
    raw.trim()
        .parse()
        .map_err(|_| NlQueryError::Config(format!("{key} has an invalid value: {raw:?}")))
}
