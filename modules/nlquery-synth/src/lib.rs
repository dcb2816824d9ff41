//! Natural-language question → structured document query.
//!
//! [`QuerySynthesizer::translate`] tries the shortcut table, builds a prompt
//! from a fresh [`SchemaSummary`](nlquery_common::SchemaSummary), calls the
//! chat model once and recovers a query from whatever text comes back.
//! [`QueryService`] adds execution and the response envelope on top.

pub mod context;
pub mod error;
pub mod extract;
pub mod prompt;
pub mod service;
pub mod shortcuts;
pub mod synthesizer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use context::ContextBuilder;
pub use error::SynthesisError;
pub use service::{Answer, QueryService};
pub use shortcuts::Shortcut;
pub use synthesizer::QuerySynthesizer;
