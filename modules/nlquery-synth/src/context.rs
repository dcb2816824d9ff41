use std::sync::Arc;

use tracing::{debug, warn};

use nlquery_common::SchemaSummary;
use nlquery_store::DocumentStore;

/// Builds the schema summary the prompt is enriched with.
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn DocumentStore>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Field names of one sample document per collection.
    ///
    /// Store failures degrade to less context rather than an error: a failed
    /// listing yields an empty summary, a failed sample an empty field list.
    pub async fn build(&self) -> SchemaSummary {
        let mut summary = SchemaSummary::new();

        let names = match self.store.collection_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list collections; prompting without schema");
                return summary;
            }
        };

        for name in names {
            let fields = match self.store.sample_document(&name).await {
                Ok(Some(doc)) => doc.keys().cloned().collect(),
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!(collection = %name, error = %e, "Failed to sample collection");
                    Vec::new()
                }
            };
            summary.push(name, fields);
        }

        debug!(collections = summary.collections().len(), "Built schema summary");
        summary
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use nlquery_store::MemoryStore;

    #[tokio::test]
    async fn test_fields_follow_sample_document_order() {
        let store = MemoryStore::from_value(json!({
            "customers": [
                {"name": "John Smith", "email": "john@example.com", "age": 35},
                {"name": "Emily Johnson", "loyalty": "gold"}
            ]
        }))
        .await
        .unwrap();
        store.create_collection("archive").await;

        let summary = ContextBuilder::new(Arc::new(store)).build().await;

        assert_eq!(
            summary.fields("customers").unwrap(),
            &["_id", "name", "email", "age"]
        );
        // Only one sample is inspected.
        assert!(!summary.fields("customers").unwrap().contains(&"loyalty".to_string()));
        assert_eq!(summary.fields("archive"), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_summary() {
        let summary = ContextBuilder::new(Arc::new(MemoryStore::new())).build().await;
        assert!(summary.is_empty());
        assert_eq!(summary.to_string(), "Database collections:\n");
    }
}
