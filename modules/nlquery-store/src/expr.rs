//! Field paths and aggregation expressions.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{invalid, StoreError};
use crate::value::number;
use nlquery_common::Document;

/// Resolve a dotted path (`address.city`, `items.0`) inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dotted path the way a query does, fanning out over arrays.
///
/// `items.name` on `items: [{"name": "pen"}, {"name": "cup"}]` resolves to
/// `["pen", "cup"]`; array values found along the way are flattened one level.
/// Paths that never cross an array of sub-documents borrow from `doc`.
pub fn resolve<'a>(doc: &'a Document, path: &str) -> Option<Cow<'a, Value>> {
    let segments: Vec<&str> = path.split('.').collect();
    let (head, rest) = segments.split_first()?;
    resolve_in(doc.get(*head)?, rest)
}

fn resolve_in<'a>(value: &'a Value, segments: &[&str]) -> Option<Cow<'a, Value>> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(Cow::Borrowed(value));
    };
    match value {
        Value::Object(map) => resolve_in(map.get(*head)?, rest),
        Value::Array(items) => {
            if let Ok(idx) = head.parse::<usize>() {
                return resolve_in(items.get(idx)?, rest);
            }
            let mut found = Vec::new();
            for item in items.iter().filter(|item| item.is_object()) {
                match resolve_in(item, segments).map(Cow::into_owned) {
                    Some(Value::Array(inner)) => found.extend(inner),
                    Some(v) => found.push(v),
                    None => {}
                }
            }
            (!found.is_empty()).then(|| Cow::Owned(Value::Array(found)))
        }
        _ => None,
    }
}

/// Whether a value is an operator object such as `{"$gt": 5}`.
pub fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

/// Evaluate an aggregation expression against one document.
///
/// `"$field"` reads a path (missing → `null`), objects of operators compute,
/// plain objects evaluate field by field, anything else is a literal.
pub fn eval(doc: &Document, expr: &Value) -> Result<Value, StoreError> {
    match expr {
        Value::String(s) if s.starts_with('$') && s.len() > 1 => {
            Ok(resolve(doc, &s[1..]).map(Cow::into_owned).unwrap_or(Value::Null))
        }
        Value::Object(map) if is_operator_object(map) => eval_operator(doc, map),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), eval(doc, value)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| eval(doc, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        literal => Ok(literal.clone()),
    }
}

fn eval_operator(doc: &Document, map: &Map<String, Value>) -> Result<Value, StoreError> {
    if map.len() != 1 {
        return Err(invalid(format!(
            "an expression object must hold exactly one operator, got {}",
            map.len()
        )));
    }
    let (op, args) = map.iter().next().ok_or_else(|| invalid("empty expression"))?;

    if op == "$literal" {
        return Ok(args.clone());
    }

    let args = match args {
        Value::Array(items) => items
            .iter()
            .map(|item| eval(doc, item))
            .collect::<Result<Vec<_>, _>>()?,
        single => vec![eval(doc, single)?],
    };

    match op.as_str() {
        "$add" | "$multiply" => {
            let Some(nums) = numeric_args(&args) else {
                return Ok(Value::Null);
            };
            let total = if op == "$add" {
                nums.iter().sum()
            } else {
                nums.iter().product()
            };
            Ok(number(total))
        }
        "$subtract" | "$divide" => {
            let [left, right] = args.as_slice() else {
                return Err(invalid(format!("{op} takes exactly two arguments")));
            };
            let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
                return Ok(Value::Null);
            };
            if op == "$subtract" {
                Ok(number(l - r))
            } else if r == 0.0 {
                Err(invalid("$divide by zero"))
            } else {
                Ok(number(l / r))
            }
        }
        "$toLower" | "$toUpper" => {
            let text = match args.first() {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Ok(Value::String(if op == "$toLower" {
                text.to_lowercase()
            } else {
                text.to_uppercase()
            }))
        }
        "$concat" => {
            let mut out = String::new();
            for arg in &args {
                match arg {
                    Value::String(s) => out.push_str(s),
                    Value::Null => return Ok(Value::Null),
                    other => return Err(invalid(format!("$concat only supports strings, got {other}"))),
                }
            }
            Ok(Value::String(out))
        }
        other => Err(invalid(format!("unsupported expression operator {other}"))),
    }
}

fn numeric_args(args: &[Value]) -> Option<Vec<f64>> {
    args.iter().map(Value::as_f64).collect()
}
