//! Recovering a JSON object from free-form model output.
//!
//! Stages run from strictest to most permissive and the first one that yields
//! a JSON object wins. Each stage is a plain function so it can be tested on
//! its own.

use std::sync::LazyLock;

use regex::Regex;

use ai_client::util::strip_code_fence;
use nlquery_common::Document;

pub type Stage = fn(&str) -> Option<Document>;

/// Extraction stages in the order they are tried.
pub const STAGES: &[(&str, Stage)] = &[
    ("direct", parse_direct),
    ("code_fence", parse_code_fence),
    ("greedy_braces", parse_greedy_braces),
    ("balanced_braces", parse_balanced_braces),
];

static GREEDY_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));
static QUOTE_THEN_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""\s+:"#).expect("valid regex"));
static COLON_THEN_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#":\s+""#).expect("valid regex"));

/// Run the stages over `text`; returns the winning stage name and the object.
pub fn extract_object(text: &str) -> Option<(&'static str, Document)> {
    let text = text.trim();
    STAGES
        .iter()
        .find_map(|(name, stage)| stage(text).map(|doc| (*name, doc)))
}

fn parse_object(candidate: &str) -> Option<Document> {
    serde_json::from_str::<Document>(candidate.trim()).ok()
}

/// The whole text is the object.
pub fn parse_direct(text: &str) -> Option<Document> {
    parse_object(text)
}

/// The object is wrapped in a markdown fence, with or without a language tag.
pub fn parse_code_fence(text: &str) -> Option<Document> {
    strip_code_fence(text).and_then(parse_object)
}

/// Everything from the first `{` to the last `}`.
pub fn parse_greedy_braces(text: &str) -> Option<Document> {
    GREEDY_OBJECT
        .find(text)
        .and_then(|m| parse_object(m.as_str()))
}

/// The first `{` and its matching `}` by nesting depth, with quote repair.
///
/// The quote swap is global, so an apostrophe inside a string value will break
/// the parse; that costs only this stage.
pub fn parse_balanced_braces(text: &str) -> Option<Document> {
    let span = balanced_span(text)?;
    parse_object(&repair_quotes(span))
}

fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Single quotes become double quotes; whitespace between a quote and a colon goes.
pub fn repair_quotes(span: &str) -> String {
    let swapped = span.replace('\'', "\"");
    let tightened = QUOTE_THEN_COLON.replace_all(&swapped, "\":");
    COLON_THEN_QUOTE.replace_all(&tightened, ":\"").into_owned()
}
