//! Question in, response envelope out: translate, execute, format.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use nlquery_common::{Config, StructuredQuery};
use nlquery_store::{DocumentStore, QueryExecutor, QueryOutput};

use crate::error::SynthesisError;
use crate::synthesizer::QuerySynthesizer;

/// Diagnostics attached to a synthesis failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfo {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_llm_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The envelope returned to a request handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Success {
        query: StructuredQuery,
        result: Value,
        question: String,
    },
    SynthesisFailed {
        error: String,
        debug: DebugInfo,
        question: String,
        #[serde(skip)]
        status: u16,
    },
    ExecutionFailed {
        error: String,
        query: StructuredQuery,
        question: String,
    },
}

impl Answer {
    /// Suggested HTTP status for the envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Answer::Success { .. } => 200,
            Answer::SynthesisFailed { status, .. } => *status,
            Answer::ExecutionFailed { .. } => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Answer::Success { .. })
    }

    fn synthesis_failed(question: &str, err: SynthesisError) -> Self {
        Answer::SynthesisFailed {
            error: err.to_string(),
            debug: DebugInfo {
                kind: err.kind(),
                raw_llm_response: err.raw_response().map(String::from),
                details: err.details(),
            },
            question: question.to_string(),
            status: err.status_code(),
        }
    }
}

/// Synthesizer and executor sharing one store handle.
#[derive(Clone)]
pub struct QueryService {
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
}

impl QueryService {
    pub fn new(synthesizer: QuerySynthesizer, executor: QueryExecutor) -> Self {
        Self {
            synthesizer,
            executor,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        Self::new(
            QuerySynthesizer::from_config(config, store.clone()),
            QueryExecutor::new(store),
        )
    }

    pub async fn ask(&self, question: &str) -> Answer {
        let query = match self.synthesizer.translate(question).await {
            Ok(query) => query,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Query synthesis failed");
                return Answer::synthesis_failed(question, e);
            }
        };

        match self.executor.execute(&query).await {
            Ok(output) => {
                info!(
                    collection = %query.collection(),
                    operation = %query.operation(),
                    "Answered question"
                );
                Answer::Success {
                    result: format_result(&query, output),
                    query,
                    question: question.to_string(),
                }
            }
            Err(e) => Answer::ExecutionFailed {
                error: format!("Database error: {e}"),
                query,
                question: question.to_string(),
            },
        }
    }
}

/// Render query output for display.
///
/// A single aggregate row keyed by a null `_id` (an ungrouped total such as an
/// overall average) is returned as that row without the `_id`.
pub fn format_result(query: &StructuredQuery, output: QueryOutput) -> Value {
    match output {
        QueryOutput::Count(n) => Value::from(n),
        QueryOutput::Documents(mut docs) => {
            let single_null_group = matches!(query, StructuredQuery::Aggregate { .. })
                && docs.len() == 1
                && matches!(docs[0].get("_id"), Some(Value::Null));
            if single_null_group {
                let mut row = docs.remove(0);
                row.shift_remove("_id");
                Value::Object(row)
            } else {
                Value::Array(docs.into_iter().map(Value::Object).collect::<Vec<_>>())
            }
        }
    }
}
