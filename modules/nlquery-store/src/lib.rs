//! Document store seam and an in-process implementation.
//!
//! - [`DocumentStore`]: what the context builder and executor need from a database
//! - [`MemoryStore`]: in-memory store evaluating a Mongo-compatible query subset
//! - [`QueryExecutor`]: runs a [`StructuredQuery`](nlquery_common::StructuredQuery) against a store

pub mod aggregate;
pub mod error;
pub mod executor;
pub mod expr;
pub mod filter;
pub mod memory;
pub mod projection;
pub mod traits;
mod value;

pub use error::{ExecutionError, StoreError};
pub use executor::{QueryExecutor, QueryOutput};
pub use memory::MemoryStore;
pub use traits::DocumentStore;
