use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlQueryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid query shape: {0}")]
    QueryShape(String),

    /// The model answered with an object carrying an `"error"` key.
    #[error("{message}")]
    ModelReported {
        message: String,
        details: serde_json::Value,
    },
}
