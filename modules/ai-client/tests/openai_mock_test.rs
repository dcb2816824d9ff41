//! HTTP-level tests for the OpenAI-compatible client.
//!
//! A WireMock server stands in for the provider so status mapping, request
//! shape and the no-credential short circuit can be checked without a key.

use std::time::Duration;

use ai_client::{AiError, ChatModel, CompletionRequest, OpenAi};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion",
        "created": 1677858242,
        "model": "llama3-70b-8192",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
}

fn agent(server: &MockServer, key: Option<&str>) -> OpenAi {
    OpenAi::new(key.map(String::from), "llama3-70b-8192")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5))
}

fn request() -> CompletionRequest {
    CompletionRequest::new()
        .system("You output only valid JSON.")
        .user("How many products are there?")
        .temperature(0.1)
}

#[tokio::test]
async fn sends_model_messages_and_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer gsk-test"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "model": "llama3-70b-8192",
            "temperature": 0.1,
            "messages": [
                { "role": "system", "content": "You output only valid JSON." },
                { "role": "user", "content": "How many products are there?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{\"ok\": true}")))
        .expect(1)
        .mount(&server)
        .await;

    let text = agent(&server, Some("gsk-test")).complete(request()).await.unwrap();
    assert_eq!(text, "{\"ok\": true}");
}

#[tokio::test]
async fn unauthorized_keeps_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"Invalid API Key\"}"))
        .mount(&server)
        .await;

    let err = agent(&server, Some("bad")).complete(request()).await.unwrap_err();
    match err {
        AiError::Unauthorized { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "{\"error\":\"Invalid API Key\"}");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_is_also_an_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = agent(&server, Some("k")).complete(request()).await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn server_error_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = agent(&server, Some("k")).complete(request()).await.unwrap_err();
    assert!(matches!(err, AiError::Api { status: 503, .. }));
    assert!(!err.is_auth());
    assert!(!err.is_transport());
}

#[tokio::test]
async fn slow_provider_times_out_as_transport_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("{}"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let ai = agent(&server, Some("k")).with_timeout(Duration::from_millis(50));
    let err = ai.complete(request()).await.unwrap_err();
    assert!(err.is_transport(), "expected transport failure, got {err:?}");
}

#[tokio::test]
async fn missing_key_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let err = agent(&server, None).complete(request()).await.unwrap_err();
    assert!(matches!(err, AiError::MissingApiKey));
}

#[tokio::test]
async fn empty_choices_is_empty_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = agent(&server, Some("k")).complete(request()).await.unwrap_err();
    assert!(matches!(err, AiError::EmptyCompletion));
}

#[tokio::test]
async fn non_json_success_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = agent(&server, Some("k")).complete(request()).await.unwrap_err();
    assert!(matches!(err, AiError::Decode(_)));
}

#[tokio::test]
async fn unreachable_host_is_transport_failure() {
    // Port 1 on loopback is never listening in test environments.
    let ai = OpenAi::new(Some("k".into()), "m")
        .with_base_url("http://127.0.0.1:1")
        .with_timeout(Duration::from_secs(2));
    let err = ai.complete(request()).await.unwrap_err();
    assert!(err.is_transport(), "expected transport failure, got {err:?}");
}
