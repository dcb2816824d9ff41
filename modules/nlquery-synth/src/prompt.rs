use nlquery_common::SchemaSummary;

/// System instruction sent with every translation request.
pub const SYSTEM_PROMPT: &str =
    "You are a MongoDB query generator that outputs only valid JSON.";

/// Build the user prompt for one question.
///
/// The output-shape block is the contract with the model: the extraction
/// stages expect exactly these keys.
pub fn build_prompt(schema: &SchemaSummary, question: &str) -> String {
    format!(
        r#"You are a MongoDB query generator. Convert the natural language question below into a MongoDB query.
Use the database context to see which collections and fields exist.

Database Context:
{schema}
Natural Language Question: {question}

Return a single JSON object with this structure:
{{
  "collection": "name_of_collection",
  "operation": "find" or "count" or "aggregate",
  "filter": {{MongoDB query filter}},
  "projection": {{fields to return}} (optional),
  "pipeline": [{{aggregation stages}}] (only for the aggregate operation)
}}

Rules:
1. Use DOUBLE QUOTES for every property name and string value.
2. The JSON must be syntactically valid, with correct commas and brackets.
3. For aggregate queries, include the complete pipeline array.
4. For averages, use a "$group" stage with the "$avg" operator.
5. Do not add explanations or comments.

Respond with the JSON object only: no markdown code fences, no surrounding text."#
    )
}
