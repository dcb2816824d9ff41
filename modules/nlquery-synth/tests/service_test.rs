//! Ask end to end: mocked provider over HTTP, in-memory store, response envelope.

use std::sync::Arc;
use std::time::Duration;

use nlquery_common::Config;
use nlquery_store::{MemoryStore, QueryExecutor};
use nlquery_synth::testing::MockChatModel;
use nlquery_synth::{Answer, QueryService, QuerySynthesizer};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sample_store() -> Arc<MemoryStore> {
    let store = MemoryStore::from_value(json!({
        "products": [
            {"_id": 1, "name": "Laptop", "category": "Electronics", "price": 1200, "stock": 45},
            {"_id": 2, "name": "Desk Chair", "category": "Furniture", "price": 250, "stock": 30},
            {"_id": 3, "name": "Coffee Table", "category": "Furniture", "price": 350, "stock": 20},
            {"_id": 4, "name": "T-shirt", "category": "Clothing", "price": 25, "stock": 200}
        ],
        "customers": [
            {"_id": 1, "name": "John Smith", "age": 35},
            {"_id": 2, "name": "Emily Johnson", "age": 28},
            {"_id": 3, "name": "Michael Brown", "age": 42},
            {"_id": 4, "name": "Sarah Wilson", "age": 31},
            {"_id": 5, "name": "David Lee", "age": 24}
        ]
    }))
    .await
    .unwrap();
    Arc::new(store)
}

fn config(server: &MockServer, key: Option<&str>) -> Config {
    Config {
        llm_api_key: key.map(String::from),
        llm_api_url: server.uri(),
        llm_model: "llama3-70b-8192".into(),
        llm_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn service_replying(reply: &str) -> QueryService {
    let store = sample_store().await;
    QueryService::new(
        QuerySynthesizer::new(Arc::new(MockChatModel::replying(reply)), store.clone()),
        QueryExecutor::new(store),
    )
}

#[tokio::test]
async fn ask_over_http_returns_success_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({"model": "llama3-70b-8192", "temperature": 0.1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"collection\": \"products\", \"operation\": \"count\", \"filter\": {\"category\": \"Furniture\"}}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let service = QueryService::from_config(&config(&server, Some("gsk-test")), sample_store().await);
    let answer = service.ask("How many furniture items are there?").await;

    assert_eq!(answer.status_code(), 200);
    assert_eq!(
        serde_json::to_value(&answer).unwrap(),
        json!({
            "query": {
                "collection": "products",
                "operation": "count",
                "filter": {"category": "Furniture"}
            },
            "result": 2,
            "question": "How many furniture items are there?"
        })
    );
}

#[tokio::test]
async fn missing_key_never_reaches_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let service = QueryService::from_config(&config(&server, None), sample_store().await);
    let answer = service.ask("How many products are there?").await;

    assert_eq!(answer.status_code(), 400);
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(body["debug"]["kind"], "configuration");
    assert_eq!(body["question"], "How many products are there?");
}

#[tokio::test]
async fn rejected_key_surfaces_upstream_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"invalid_api_key\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let service = QueryService::from_config(&config(&server, Some("gsk-bad")), sample_store().await);
    let answer = service.ask("How many products are there?").await;

    assert_eq!(answer.status_code(), 401);
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(body["debug"]["details"]["upstream_status"], 401);
    assert_eq!(
        body["debug"]["details"]["upstream_body"],
        "{\"error\":\"invalid_api_key\"}"
    );
}

#[tokio::test]
async fn shortcut_answer_is_flattened() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let service = QueryService::from_config(&config(&server, None), sample_store().await);
    let answer = service.ask("What's the average age of customers?").await;

    assert!(answer.is_success());
    let Answer::Success { result, .. } = answer else {
        unreachable!()
    };
    assert_eq!(result, json!({"averageAge": 32.0}));
}

#[tokio::test]
async fn find_results_are_a_list() {
    let service = service_replying(
        r#"{"collection": "products", "operation": "find", "filter": {"price": {"$gt": 300}}, "projection": {"name": 1, "_id": 0}}"#,
    )
    .await;

    let answer = service.ask("Which products cost more than $300?").await;
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(
        body["result"],
        json!([{"name": "Laptop"}, {"name": "Coffee Table"}])
    );
}

#[tokio::test]
async fn grouped_aggregate_is_not_flattened() {
    let service = service_replying(
        r#"{"collection": "products", "operation": "aggregate", "pipeline": [{"$group": {"_id": "$category", "n": {"$sum": 1}}}, {"$sort": {"n": -1}}, {"$limit": 1}]}"#,
    )
    .await;

    let body = serde_json::to_value(service.ask("Biggest category?").await).unwrap();
    assert_eq!(body["result"], json!([{"_id": "Furniture", "n": 2}]));
}

#[tokio::test]
async fn unparseable_reply_keeps_raw_text() {
    let reply = "I cannot answer that.";
    let service = service_replying(reply).await;

    let answer = service.ask("What is the meaning of life?").await;

    assert_eq!(answer.status_code(), 500);
    assert_eq!(
        serde_json::to_value(&answer).unwrap(),
        json!({
            "error": "Failed to parse LLM response into valid JSON",
            "debug": {"kind": "parse", "raw_llm_response": reply},
            "question": "What is the meaning of life?"
        })
    );
}

#[tokio::test]
async fn unsupported_operation_is_a_database_error() {
    let service =
        service_replying(r#"{"collection": "products", "operation": "drop"}"#).await;

    let answer = service.ask("Drop the products").await;

    assert_eq!(answer.status_code(), 500);
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(body["error"], "Database error: Operation drop not supported");
    assert_eq!(body["query"]["operation"], "drop");
}

#[tokio::test]
async fn empty_question_envelope() {
    let service = service_replying("{}").await;
    let answer = service.ask("").await;

    assert_eq!(answer.status_code(), 400);
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(body["error"], "No question provided");
}
