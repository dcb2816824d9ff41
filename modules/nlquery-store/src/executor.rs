use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ExecutionError;
use crate::traits::DocumentStore;
use nlquery_common::{Document, StructuredQuery};

/// What a query produced: documents for `find`/`aggregate`, a number for `count`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Documents(Vec<Document>),
    Count(u64),
}

/// Dispatches structured queries to an injected store.
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, query: &StructuredQuery) -> Result<QueryOutput, ExecutionError> {
        debug!(
            collection = %query.collection(),
            operation = %query.operation(),
            "Executing query"
        );

        let result = match query {
            StructuredQuery::Find {
                collection,
                filter,
                projection,
            } => self
                .store
                .find(collection, filter, projection.as_ref())
                .await
                .map(QueryOutput::Documents),
            StructuredQuery::Count { collection, filter } => self
                .store
                .count(collection, filter)
                .await
                .map(QueryOutput::Count),
            StructuredQuery::Aggregate {
                collection,
                pipeline,
            } => self
                .store
                .aggregate(collection, pipeline)
                .await
                .map(QueryOutput::Documents),
            StructuredQuery::Unsupported { operation, .. } => {
                warn!(operation = %operation, "Unsupported operation");
                return Err(ExecutionError::UnsupportedOperation(operation.clone()));
            }
        };

        result.map_err(|e| {
            warn!(error = %e, collection = %query.collection(), "Query execution failed");
            ExecutionError::from(e)
        })
    }
}
