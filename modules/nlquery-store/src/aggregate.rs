//! Aggregation pipeline evaluation.
//!
//! Stages run in order over an owned batch of documents: `$match`, `$group`,
//! `$sort`, `$limit`, `$skip`, `$project`, `$count`, `$unwind`.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{invalid, StoreError};
use crate::expr::{eval, lookup};
use crate::value::{compare, number, values_equal};
use crate::filter::Filter;
use crate::projection;
use nlquery_common::Document;

/// Run `pipeline` over `docs`.
pub fn run(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let (name, spec) = single_key(stage)?;
        debug!(stage = %name, input = docs.len(), "Running pipeline stage");
        docs = match name {
            "$match" => {
                let cond = Filter::new(object(name, spec)?)?;
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if cond.matches(&doc)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$group" => group(&docs, object(name, spec)?)?,
            "$sort" => sort(docs, object(name, spec)?)?,
            "$limit" => {
                let n = count_arg(name, spec)?;
                docs.into_iter().take(n).collect()
            }
            "$skip" => {
                let n = count_arg(name, spec)?;
                docs.into_iter().skip(n).collect()
            }
            "$project" => {
                let proj = object(name, spec)?;
                docs.iter()
                    .map(|doc| projection::apply(doc, proj))
                    .collect::<Result<_, _>>()?
            }
            "$count" => {
                let field = spec
                    .as_str()
                    .filter(|s| !s.is_empty() && !s.starts_with('$'))
                    .ok_or_else(|| invalid("$count requires a field name"))?;
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(field.to_string(), Value::from(docs.len()));
                    vec![out]
                }
            }
            "$unwind" => unwind(docs, spec)?,
            other => return Err(invalid(format!("unsupported pipeline stage {other}"))),
        };
    }
    Ok(docs)
}

fn single_key(stage: &Document) -> Result<(&str, &Value), StoreError> {
    let mut iter = stage.iter();
    match (iter.next(), iter.next()) {
        (Some((name, spec)), None) => Ok((name.as_str(), spec)),
        _ => Err(invalid("each pipeline stage must have exactly one key")),
    }
}

fn object<'a>(stage: &str, spec: &'a Value) -> Result<&'a Document, StoreError> {
    spec.as_object()
        .ok_or_else(|| invalid(format!("{stage} requires an object")))
}

fn count_arg(stage: &str, spec: &Value) -> Result<usize, StoreError> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| invalid(format!("{stage} requires a non-negative integer")))
}

// =============================================================================
// $group
// =============================================================================

enum Acc {
    Sum { total: f64 },
    Avg { total: f64, n: usize },
    Min(Option<Value>),
    Max(Option<Value>),
    Count(usize),
    First(Option<Value>),
    Last(Value),
    Push(Vec<Value>),
}

impl Acc {
    fn new(op: &str) -> Result<Self, StoreError> {
        Ok(match op {
            "$sum" => Acc::Sum { total: 0.0 },
            "$avg" => Acc::Avg { total: 0.0, n: 0 },
            "$min" => Acc::Min(None),
            "$max" => Acc::Max(None),
            "$count" => Acc::Count(0),
            "$first" => Acc::First(None),
            "$last" => Acc::Last(Value::Null),
            "$push" => Acc::Push(Vec::new()),
            other => return Err(invalid(format!("unsupported accumulator {other}"))),
        })
    }

    fn feed(&mut self, value: Value) {
        match self {
            Acc::Sum { total } => {
                if let Some(n) = value.as_f64() {
                    *total += n;
                }
            }
            Acc::Avg { total, n } => {
                if let Some(x) = value.as_f64() {
                    *total += x;
                    *n += 1;
                }
            }
            Acc::Min(current) => {
                if !value.is_null()
                    && current.as_ref().map_or(true, |c| compare(&value, c) == Ordering::Less)
                {
                    *current = Some(value);
                }
            }
            Acc::Max(current) => {
                if !value.is_null()
                    && current.as_ref().map_or(true, |c| compare(&value, c) == Ordering::Greater)
                {
                    *current = Some(value);
                }
            }
            Acc::Count(n) => *n += 1,
            Acc::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Acc::Last(current) => *current = value,
            Acc::Push(items) => items.push(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Acc::Sum { total } => number(total),
            Acc::Avg { total, n } => {
                if n == 0 {
                    Value::Null
                } else {
                    serde_json::Number::from_f64(total / n as f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Acc::Min(v) | Acc::Max(v) | Acc::First(v) => v.unwrap_or(Value::Null),
            Acc::Count(n) => Value::from(n),
            Acc::Last(v) => v,
            Acc::Push(items) => Value::Array(items),
        }
    }
}

struct Group {
    key: Value,
    accs: Vec<Acc>,
}

fn group(docs: &[Document], spec: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| invalid("$group requires an _id"))?;

    let mut fields: Vec<(&str, &str, &Value)> = Vec::new();
    for (name, acc) in spec.iter().filter(|(name, _)| name.as_str() != "_id") {
        let Some(acc) = acc.as_object() else {
            return Err(invalid(format!("$group field {name} must be an accumulator object")));
        };
        let mut iter = acc.iter();
        let (Some((op, arg)), None) = (iter.next(), iter.next()) else {
            return Err(invalid(format!("$group field {name} must use exactly one accumulator")));
        };
        Acc::new(op)?;
        fields.push((name.as_str(), op.as_str(), arg));
    }

    // Groups keep first-seen order.
    let mut groups: Vec<Group> = Vec::new();
    for doc in docs {
        let key = eval(doc, key_expr)?;
        let idx = match groups.iter().position(|g| values_equal(&g.key, &key)) {
            Some(idx) => idx,
            None => {
                let accs = fields
                    .iter()
                    .map(|(_, op, _)| Acc::new(op))
                    .collect::<Result<_, _>>()?;
                groups.push(Group { key, accs });
                groups.len() - 1
            }
        };
        for (acc, (_, _, arg)) in groups[idx].accs.iter_mut().zip(&fields) {
            acc.feed(eval(doc, arg)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|g| {
            let mut out = Map::new();
            out.insert("_id".to_string(), g.key);
            for ((name, _, _), acc) in fields.iter().zip(g.accs) {
                out.insert(name.to_string(), acc.finish());
            }
            out
        })
        .collect())
}

// =============================================================================
// $sort / $unwind
// =============================================================================

fn sort(mut docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, dir) in spec {
        let descending = match dir.as_f64() {
            Some(d) if d == 1.0 => false,
            Some(d) if d == -1.0 => true,
            _ => return Err(invalid(format!("$sort direction for {field} must be 1 or -1"))),
        };
        keys.push((field.as_str(), descending));
    }
    if keys.is_empty() {
        return Err(invalid("$sort requires at least one field"));
    }

    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let left = lookup(a, field).unwrap_or(&Value::Null);
            let right = lookup(b, field).unwrap_or(&Value::Null);
            let ord = compare(left, right);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(docs)
}

fn unwind(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let path = match spec {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("$unwind requires a path"))?,
        _ => return Err(invalid("$unwind requires a field path")),
    };
    let field = path
        .strip_prefix('$')
        .filter(|f| !f.contains('.'))
        .ok_or_else(|| invalid("$unwind path must be a top-level \"$field\""))?;

    let mut out = Vec::new();
    for doc in docs {
        match doc.get(field) {
            Some(Value::Array(items)) => {
                for item in items.clone() {
                    let mut copy = doc.clone();
                    copy.insert(field.to_string(), item);
                    out.push(copy);
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}
