use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::NlQueryError;

/// A stored document. Key order is encounter order (`preserve_order`).
pub type Document = Map<String, Value>;

// =============================================================================
// Schema Summary
// =============================================================================

/// Fields seen in one sample document of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<String>,
}

/// Collection name → field names, in the order the store reported them.
///
/// Derived from a single sample per collection, so it is a hint for the
/// prompt, not a complete schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    collections: Vec<CollectionSchema>,
}

impl SchemaSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, fields: Vec<String>) {
        self.collections.push(CollectionSchema {
            name: name.into(),
            fields,
        });
    }

    pub fn collections(&self) -> &[CollectionSchema] {
        &self.collections
    }

    pub fn fields(&self, collection: &str) -> Option<&[String]> {
        self.collections
            .iter()
            .find(|c| c.name == collection)
            .map(|c| c.fields.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl fmt::Display for SchemaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database collections:")?;
        for collection in &self.collections {
            writeln!(f, "- {}: {}", collection.name, collection.fields.join(", "))?;
        }
        Ok(())
    }
}

// =============================================================================
// Structured Query
// =============================================================================

/// An executable query recovered from a natural-language question.
///
/// `Unsupported` carries an operation tag the executor does not know, so the
/// rejection happens at execution time and is reported as an execution error.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredQuery {
    Find {
        collection: String,
        filter: Document,
        projection: Option<Document>,
    },
    Count {
        collection: String,
        filter: Document,
    },
    Aggregate {
        collection: String,
        pipeline: Vec<Document>,
    },
    Unsupported {
        collection: String,
        operation: String,
    },
}

impl StructuredQuery {
    pub fn collection(&self) -> &str {
        match self {
            StructuredQuery::Find { collection, .. }
            | StructuredQuery::Count { collection, .. }
            | StructuredQuery::Aggregate { collection, .. }
            | StructuredQuery::Unsupported { collection, .. } => collection,
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            StructuredQuery::Find { .. } => "find",
            StructuredQuery::Count { .. } => "count",
            StructuredQuery::Aggregate { .. } => "aggregate",
            StructuredQuery::Unsupported { operation, .. } => operation,
        }
    }

    /// JSON form: `collection`, `operation`, then `filter`/`projection` or `pipeline`.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("collection".into(), Value::String(self.collection().to_string()));
        out.insert("operation".into(), Value::String(self.operation().to_string()));
        match self {
            StructuredQuery::Find {
                filter, projection, ..
            } => {
                out.insert("filter".into(), Value::Object(filter.clone()));
                if let Some(projection) = projection {
                    out.insert("projection".into(), Value::Object(projection.clone()));
                }
            }
            StructuredQuery::Count { filter, .. } => {
                out.insert("filter".into(), Value::Object(filter.clone()));
            }
            StructuredQuery::Aggregate { pipeline, .. } => {
                let stages = pipeline.iter().cloned().map(Value::Object).collect();
                out.insert("pipeline".into(), Value::Array(stages));
            }
            StructuredQuery::Unsupported { .. } => {}
        }
        Value::Object(out)
    }

    /// Interpret a JSON object in the model's output shape.
    ///
    /// An `"error"` key wins over every other field. Missing `filter` and
    /// `pipeline` default to empty; an empty `projection` counts as none.
    pub fn from_document(doc: Document) -> Result<Self, NlQueryError> {
        if let Some(error) = doc.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(NlQueryError::ModelReported {
                message,
                details: Value::Object(doc),
            });
        }

        let collection = match doc.get("collection") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            Some(_) => return Err(shape("\"collection\" must be a non-empty string")),
            None => return Err(shape("missing \"collection\"")),
        };

        let operation = match doc.get("operation") {
            Some(Value::String(op)) => op.trim().to_ascii_lowercase(),
            Some(Value::Null) | None => String::new(),
            Some(_) => return Err(shape("\"operation\" must be a string")),
        };

        match operation.as_str() {
            "find" => Ok(StructuredQuery::Find {
                collection,
                filter: object_field(&doc, "filter")?.unwrap_or_default(),
                projection: object_field(&doc, "projection")?.filter(|p| !p.is_empty()),
            }),
            "count" => Ok(StructuredQuery::Count {
                collection,
                filter: object_field(&doc, "filter")?.unwrap_or_default(),
            }),
            "aggregate" => Ok(StructuredQuery::Aggregate {
                collection,
                pipeline: pipeline_field(&doc)?,
            }),
            _ => Ok(StructuredQuery::Unsupported {
                collection,
                operation,
            }),
        }
    }
}

impl Serialize for StructuredQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn shape(msg: &str) -> NlQueryError {
    NlQueryError::QueryShape(msg.to_string())
}

fn object_field(doc: &Document, key: &str) -> Result<Option<Document>, NlQueryError> {
    match doc.get(key) {
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(NlQueryError::QueryShape(format!("\"{key}\" must be an object"))),
    }
}

fn pipeline_field(doc: &Document) -> Result<Vec<Document>, NlQueryError> {
    match doc.get("pipeline") {
        Some(Value::Array(stages)) => stages
            .iter()
            .map(|stage| match stage {
                Value::Object(map) => Ok(map.clone()),
                _ => Err(shape("every \"pipeline\" stage must be an object")),
            })
            .collect(),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(shape("\"pipeline\" must be an array")),
    }
}
