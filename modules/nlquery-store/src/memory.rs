//! In-memory document store.
//!
//! Evaluates the same filter, projection and pipeline dialect a Mongo server
//! would for the subset the synthesizer produces. Used by the CLI with a JSON
//! data file and by tests that need a store without a running database.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::DocumentStore;
use crate::filter::Filter;
use crate::{aggregate, projection};
use nlquery_common::Document;

/// Collections kept in insertion order; absent collections read as empty.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Vec<(String, Vec<Document>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `{"collection": [document, ...], ...}`.
    pub async fn from_value(data: Value) -> Result<Self, StoreError> {
        let Value::Object(collections) = data else {
            return Err(StoreError::Backend(
                "data must be an object of collection name to document array".to_string(),
            ));
        };

        let store = Self::new();
        for (name, docs) in collections {
            let Value::Array(docs) = docs else {
                return Err(StoreError::Backend(format!(
                    "collection {name} must be an array of documents"
                )));
            };
            let docs = docs
                .into_iter()
                .map(|d| match d {
                    Value::Object(map) => Ok(map),
                    other => Err(StoreError::Backend(format!(
                        "collection {name} holds a non-document value: {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            store.insert_many(&name, docs).await;
        }
        Ok(store)
    }

    /// Insert documents, assigning a string `_id` to any that lack one.
    /// Returns the ids in insertion order.
    pub async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Vec<Value> {
        let mut collections = self.collections.write().await;
        let idx = match collections.iter().position(|(name, _)| name == collection) {
            Some(idx) => idx,
            None => {
                collections.push((collection.to_string(), Vec::new()));
                collections.len() - 1
            }
        };

        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = with_id(doc);
            ids.push(doc["_id"].clone());
            collections[idx].1.push(doc);
        }
        debug!(collection, inserted = ids.len(), "Inserted documents");
        ids
    }

    /// Create an empty collection (listed, but with no sample).
    pub async fn create_collection(&self, collection: &str) {
        let mut collections = self.collections.write().await;
        if !collections.iter().any(|(name, _)| name == collection) {
            collections.push((collection.to_string(), Vec::new()));
        }
    }

    async fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, docs)| docs.clone())
            .unwrap_or_default()
    }
}

/// Put `_id` first, generating one when missing.
fn with_id(mut doc: Document) -> Document {
    let id = doc
        .shift_remove("_id")
        .unwrap_or_else(|| Value::String(Uuid::new_v4().simple().to_string()));
    let mut out = Document::new();
    out.insert("_id".to_string(), id);
    out.extend(doc);
    out
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .iter()
            .find(|(name, _)| name == collection)
            .and_then(|(_, docs)| docs.first().cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: Option<&Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let filter = Filter::new(filter)?;
        let mut out = Vec::new();
        for doc in self.snapshot(collection).await {
            if !filter.matches(&doc)? {
                continue;
            }
            out.push(match projection {
                Some(proj) => projection::apply(&doc, proj)?,
                None => doc,
            });
        }
        Ok(out)
    }

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        let filter = Filter::new(filter)?;
        let mut n = 0;
        for doc in self.snapshot(collection).await {
            if filter.matches(&doc)? {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        aggregate::run(self.snapshot(collection).await, pipeline)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_generated_id_comes_first() {
        let store = MemoryStore::new();
        let ids = store
            .insert_many("products", vec![json!({"name": "Laptop"}).as_object().cloned().unwrap()])
            .await;
        assert_eq!(ids.len(), 1);

        let sample = store.sample_document("products").await.unwrap().unwrap();
        assert_eq!(sample.keys().collect::<Vec<_>>(), vec!["_id", "name"]);
        assert_eq!(sample["_id"], ids[0]);
    }

    #[tokio::test]
    async fn test_existing_id_is_kept() {
        let store = MemoryStore::from_value(json!({"c": [{"name": "x", "_id": 7}]}))
            .await
            .unwrap();
        let sample = store.sample_document("c").await.unwrap().unwrap();
        assert_eq!(Value::Object(sample), json!({"_id": 7, "name": "x"}));
    }

    #[tokio::test]
    async fn test_missing_collection_reads_empty() {
        let store = MemoryStore::new();
        assert!(store.sample_document("nope").await.unwrap().is_none());
        assert_eq!(store.count("nope", &Document::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_from_value_rejects_non_documents() {
        let err = MemoryStore::from_value(json!({"c": [1, 2]})).await.err().unwrap();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
