use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The query uses an operator, stage or value shape the store cannot evaluate.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Failures executing a structured query. Kept apart from synthesis errors so
/// callers can tell "the model produced nothing usable" from "the database
/// refused what the model produced".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Operation {0} not supported")]
    UnsupportedOperation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::InvalidQuery(msg.into())
}
