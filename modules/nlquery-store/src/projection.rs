//! Field projection shared by `find` and the `$project` stage.

use serde_json::Value;

use crate::error::{invalid, StoreError};
use crate::expr::{eval, lookup};
use crate::value::is_truthy;
use nlquery_common::Document;

enum Spec<'a> {
    Include,
    Exclude,
    Computed(&'a Value),
}

/// Apply a projection to one document.
///
/// Inclusion mode keeps `_id` unless it is explicitly excluded; exclusion mode
/// drops the fields flagged false. Mixing the two (other than for `_id`) is an
/// error. String or object values compute a new field and count as inclusion.
/// `_id` only decides the mode when it is the sole field.
pub fn apply(doc: &Document, projection: &Document) -> Result<Document, StoreError> {
    if projection.is_empty() {
        return Ok(doc.clone());
    }

    let mut specs = Vec::with_capacity(projection.len());
    for (field, flag) in projection {
        let spec = match flag {
            Value::String(_) | Value::Object(_) => Spec::Computed(flag),
            other => match is_truthy(other) {
                Some(true) => Spec::Include,
                Some(false) => Spec::Exclude,
                None => return Err(invalid(format!("invalid projection value for {field}: {other}"))),
            },
        };
        specs.push((field.as_str(), spec));
    }

    let id_only = specs.iter().all(|(field, _)| *field == "_id");
    let inclusion = specs
        .iter()
        .filter(|(field, _)| id_only || *field != "_id")
        .any(|(_, spec)| !matches!(spec, Spec::Exclude));

    if inclusion {
        if let Some((field, _)) = specs
            .iter()
            .find(|(field, spec)| *field != "_id" && matches!(spec, Spec::Exclude))
        {
            return Err(invalid(format!(
                "cannot exclude field {field} in an inclusion projection"
            )));
        }
        include(doc, &specs)
    } else {
        let mut out = doc.clone();
        for (field, spec) in &specs {
            if matches!(spec, Spec::Exclude) {
                out.shift_remove(*field);
            }
        }
        Ok(out)
    }
}

fn include(doc: &Document, specs: &[(&str, Spec<'_>)]) -> Result<Document, StoreError> {
    let mut out = Document::new();

    let id_excluded = specs
        .iter()
        .any(|(field, spec)| *field == "_id" && matches!(spec, Spec::Exclude));
    if !id_excluded {
        if let Some(id) = doc.get("_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }

    for (field, spec) in specs {
        match spec {
            Spec::Include if *field != "_id" => {
                if let Some(value) = lookup(doc, field) {
                    out.insert(field.to_string(), value.clone());
                }
            }
            Spec::Computed(expr) => {
                out.insert(field.to_string(), eval(doc, expr)?);
            }
            _ => {}
        }
    }
    Ok(out)
}
