pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, DEFAULT_LLM_TEMPERATURE};
pub use error::NlQueryError;
pub use types::*;
