use async_trait::async_trait;

use crate::error::StoreError;
use nlquery_common::Document;

/// Read access to a document database.
///
/// The handle is long-lived and shared between requests; implementations must
/// be safe for concurrent use.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All collection names, in whatever order the backend reports them.
    async fn collection_names(&self) -> Result<Vec<String>, StoreError>;

    /// One arbitrary document from a collection, `None` if it is empty or absent.
    async fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError>;

    /// Documents matching `filter`, optionally projected.
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: Option<&Document>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Number of documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError>;

    /// Run an aggregation pipeline, stages in order.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError>;
}
