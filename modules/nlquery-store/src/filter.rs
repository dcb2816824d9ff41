//! Filter predicates in the Mongo query-document dialect.
//!
//! Supported: implicit equality (including array membership), `$eq $ne $gt
//! $gte $lt $lte $in $nin $exists $regex $size $not`, and the logical
//! `$and $or $nor`. Anything else is rejected rather than ignored so a
//! misunderstood filter never silently matches everything.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::error::{invalid, StoreError};
use crate::expr::{is_operator_object, resolve};
use crate::value::{compare, same_type_class, values_equal};
use nlquery_common::Document;

/// Test one document against a filter. An empty filter matches everything.
///
/// Compiles the filter on every call; use [`Filter`] when scanning many documents.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    Filter::new(filter)?.matches(doc)
}

/// A filter document with its `$regex` patterns compiled up front.
pub struct Filter<'f> {
    spec: &'f Document,
    regexes: HashMap<(&'f str, &'f str), Regex>,
}

impl<'f> Filter<'f> {
    pub fn new(spec: &'f Document) -> Result<Self, StoreError> {
        let mut regexes = HashMap::new();
        collect_in_document(spec, &mut regexes)?;
        Ok(Self { spec, regexes })
    }

    pub fn matches(&self, doc: &Document) -> Result<bool, StoreError> {
        self.document_matches(doc, self.spec)
    }

    fn document_matches(&self, doc: &Document, filter: &'f Document) -> Result<bool, StoreError> {
        for (key, cond) in filter {
            let ok = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for term in logical_terms(key, cond)? {
                        if !self.document_matches(doc, term)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" | "$nor" => {
                    let mut any = false;
                    for term in logical_terms(key, cond)? {
                        if self.document_matches(doc, term)? {
                            any = true;
                            break;
                        }
                    }
                    if key == "$or" {
                        any
                    } else {
                        !any
                    }
                }
                op if op.starts_with('$') => {
                    return Err(invalid(format!("unsupported top-level operator {op}")))
                }
                path => self.field_matches(resolve(doc, path).as_deref(), cond)?,
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn field_matches(&self, actual: Option<&Value>, cond: &'f Value) -> Result<bool, StoreError> {
        match cond {
            Value::Object(ops) if is_operator_object(ops) => self.operators_match(actual, ops),
            literal => Ok(equals(actual, literal)),
        }
    }

    fn operators_match(
        &self,
        actual: Option<&Value>,
        ops: &'f Map<String, Value>,
    ) -> Result<bool, StoreError> {
        for (op, arg) in ops {
            let ok = match op.as_str() {
                "$eq" => equals(actual, arg),
                "$ne" => !equals(actual, arg),
                "$gt" => ordered(actual, arg, |o| o.is_gt()),
                "$gte" => ordered(actual, arg, |o| o.is_ge()),
                "$lt" => ordered(actual, arg, |o| o.is_lt()),
                "$lte" => ordered(actual, arg, |o| o.is_le()),
                "$in" => in_list(actual, op, arg)?,
                "$nin" => !in_list(actual, op, arg)?,
                "$exists" => {
                    let want = match arg {
                        Value::Bool(b) => *b,
                        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
                        _ => return Err(invalid("$exists requires a boolean")),
                    };
                    actual.is_some() == want
                }
                "$regex" => self.regex_match(actual, arg, ops.get("$options"))?,
                // Consumed together with $regex.
                "$options" => {
                    if !ops.contains_key("$regex") {
                        return Err(invalid("$options without $regex"));
                    }
                    true
                }
                "$size" => {
                    let want = arg
                        .as_u64()
                        .ok_or_else(|| invalid("$size requires a non-negative integer"))?;
                    matches!(actual, Some(Value::Array(items)) if items.len() as u64 == want)
                }
                "$not" => match arg {
                    Value::Object(inner) if is_operator_object(inner) => {
                        !self.operators_match(actual, inner)?
                    }
                    Value::String(_) => !self.regex_match(actual, arg, None)?,
                    _ => return Err(invalid("$not requires an operator object")),
                },
                other => return Err(invalid(format!("unsupported filter operator {other}"))),
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn regex_match(
        &self,
        actual: Option<&Value>,
        pattern: &'f Value,
        options: Option<&'f Value>,
    ) -> Result<bool, StoreError> {
        let key = regex_key(pattern, options)?;
        let re = self
            .regexes
            .get(&key)
            .ok_or_else(|| invalid(format!("$regex {} was not compiled", key.0)))?;

        Ok(match actual {
            Some(Value::String(s)) => re.is_match(s),
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| matches!(item, Value::String(s) if re.is_match(s))),
            _ => false,
        })
    }
}

// =============================================================================
// Regex compilation
// =============================================================================

type RegexCache<'f> = HashMap<(&'f str, &'f str), Regex>;

fn collect_in_document<'f>(filter: &'f Document, out: &mut RegexCache<'f>) -> Result<(), StoreError> {
    for (key, cond) in filter {
        match (key.as_str(), cond) {
            ("$and" | "$or" | "$nor", Value::Array(terms)) => {
                for term in terms.iter().filter_map(Value::as_object) {
                    collect_in_document(term, out)?;
                }
            }
            (_, Value::Object(ops)) if is_operator_object(ops) => collect_in_operators(ops, out)?,
            _ => {}
        }
    }
    Ok(())
}

fn collect_in_operators<'f>(
    ops: &'f Map<String, Value>,
    out: &mut RegexCache<'f>,
) -> Result<(), StoreError> {
    if let Some(pattern) = ops.get("$regex") {
        compile_into(regex_key(pattern, ops.get("$options"))?, out)?;
    }
    match ops.get("$not") {
        Some(Value::Object(inner)) if is_operator_object(inner) => collect_in_operators(inner, out)?,
        Some(pattern @ Value::String(_)) => compile_into(regex_key(pattern, None)?, out)?,
        _ => {}
    }
    Ok(())
}

fn regex_key<'f>(
    pattern: &'f Value,
    options: Option<&'f Value>,
) -> Result<(&'f str, &'f str), StoreError> {
    let Value::String(pattern) = pattern else {
        return Err(invalid("$regex requires a string pattern"));
    };
    let flags = match options {
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(invalid("$options must be a string")),
        None => "",
    };
    Ok((pattern.as_str(), flags))
}

fn compile_into<'f>(key: (&'f str, &'f str), out: &mut RegexCache<'f>) -> Result<(), StoreError> {
    if out.contains_key(&key) {
        return Ok(());
    }
    let (pattern, flags) = key;
    let re = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|e| invalid(format!("invalid $regex: {e}")))?;
    out.insert(key, re);
    Ok(())
}

// =============================================================================
// Value predicates
// =============================================================================

fn logical_terms<'a>(op: &str, cond: &'a Value) -> Result<Vec<&'a Document>, StoreError> {
    let Value::Array(items) = cond else {
        return Err(invalid(format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(invalid(format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| invalid(format!("{op} entries must be objects")))
        })
        .collect()
}

/// Equality with array semantics: `{"tags": "x"}` matches `tags: ["x", "y"]`,
/// and `{"f": null}` matches a missing field.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn ordered(
    actual: Option<&Value>,
    bound: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let check = |v: &Value| same_type_class(v, bound) && accept(compare(v, bound));
    match actual {
        None => false,
        Some(Value::Array(items)) if !bound.is_array() => items.iter().any(check),
        Some(value) => check(value),
    }
}

fn in_list(actual: Option<&Value>, op: &str, list: &Value) -> Result<bool, StoreError> {
    let Value::Array(candidates) = list else {
        return Err(invalid(format!("{op} requires an array")));
    };
    Ok(candidates.iter().any(|c| equals(actual, c)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn check(d: &Value, f: Value) -> bool {
        matches(&doc(d.clone()), &doc(f)).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(check(&json!({"a": 1}), json!({})));
    }

    #[test]
    fn test_implicit_equality_and_array_membership() {
        let d = json!({"category": "Electronics", "tags": ["sale", "new"], "price": 150});
        assert!(check(&d, json!({"category": "Electronics"})));
        assert!(!check(&d, json!({"category": "Furniture"})));
        assert!(check(&d, json!({"tags": "sale"})));
        assert!(check(&d, json!({"price": 150.0})));
        assert!(check(&d, json!({"missing": null})));
    }

    #[test]
    fn test_comparison_operators() {
        let d = json!({"age": 35, "name": "John"});
        assert!(check(&d, json!({"age": {"$gt": 30, "$lte": 35}})));
        assert!(!check(&d, json!({"age": {"$lt": 30}})));
        // No cross-type comparisons.
        assert!(!check(&d, json!({"age": {"$gt": "10"}})));
        assert!(check(&d, json!({"name": {"$ne": "Emily"}})));
    }

    #[test]
    fn test_in_nin_exists() {
        let d = json!({"category": "Clothing"});
        assert!(check(&d, json!({"category": {"$in": ["Clothing", "Footwear"]}})));
        assert!(!check(&d, json!({"category": {"$nin": ["Clothing"]}})));
        assert!(check(&d, json!({"stock": {"$exists": false}})));
        assert!(!check(&d, json!({"category": {"$exists": false}})));
    }

    #[test]
    fn test_regex_with_options() {
        let d = json!({"email": "Sarah@Example.com"});
        assert!(check(&d, json!({"email": {"$regex": "example\\.com$", "$options": "i"}})));
        assert!(!check(&d, json!({"email": {"$regex": "example\\.com$"}})));
    }

    #[test]
    fn test_logical_operators() {
        let d = json!({"price": 25, "category": "Clothing"});
        assert!(check(
            &d,
            json!({"$or": [{"price": {"$gt": 1000}}, {"category": "Clothing"}]})
        ));
        assert!(!check(
            &d,
            json!({"$and": [{"price": {"$lt": 100}}, {"category": "Furniture"}]})
        ));
        assert!(check(&d, json!({"$nor": [{"category": "Furniture"}]})));
        assert!(check(&d, json!({"price": {"$not": {"$gt": 100}}})));
    }

    #[test]
    fn test_dotted_path_into_array_of_documents() {
        let d = json!({"items": [{"name": "pen", "qty": 2}, {"name": "cup", "qty": 10}]});
        assert!(check(&d, json!({"items.name": "cup"})));
        assert!(!check(&d, json!({"items.name": "mug"})));
        assert!(check(&d, json!({"items.qty": {"$gt": 5}})));
        assert!(!check(&d, json!({"items.name": {"$ne": "pen"}})));
        assert!(check(&d, json!({"items.name": {"$in": ["mug", "cup"]}})));
        assert!(check(&d, json!({"items.color": {"$exists": false}})));
        assert!(check(&d, json!({"items.0.name": "pen"})));
    }

    #[test]
    fn test_compiled_filter_is_reused_across_documents() {
        let spec = doc(json!({"$or": [
            {"name": {"$regex": "^j", "$options": "i"}},
            {"email": {"$not": {"$regex": "example"}}}
        ]}));
        let filter = Filter::new(&spec).unwrap();
        assert_eq!(filter.regexes.len(), 2);

        assert!(filter.matches(&doc(json!({"name": "John", "email": "john@example.com"}))).unwrap());
        assert!(filter.matches(&doc(json!({"name": "Sarah", "email": "sarah@elsewhere.org"}))).unwrap());
        assert!(!filter.matches(&doc(json!({"name": "Emily", "email": "emily@example.com"}))).unwrap());
    }

    #[test]
    fn test_invalid_regex_fails_at_compile() {
        let spec = doc(json!({"name": {"$regex": "("}}));
        assert!(matches!(Filter::new(&spec), Err(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = matches(&doc(json!({"a": 1})), &doc(json!({"a": {"$near": [0, 0]}}))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
        let err = matches(&doc(json!({"a": 1})), &doc(json!({"$where": "1"}))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }
}
