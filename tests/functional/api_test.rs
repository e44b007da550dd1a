//! Functional tests for the HTTP surface

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chat_relay::api::routes::create_router;
use chat_relay::backend::ChatMessage;
use chat_relay::config::{RelayConfig, Settings};
use chat_relay::relay::{ChatResult, Relay};
use chat_relay::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(config: RelayConfig) -> Router {
    create_router(Arc::new(AppState::new(Settings::default(), Relay::new(config))))
}

fn token_config() -> RelayConfig {
    RelayConfig {
        openai_access_token: Some("token".to_string()),
        ..Default::default()
    }
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(token_config()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "ChatGPTUnofficialProxyAPI");
}

#[tokio::test]
async fn test_config_report() {
    let config = RelayConfig {
        socks_proxy_host: Some("127.0.0.1".to_string()),
        socks_proxy_port: Some("1080".to_string()),
        ..token_config()
    };

    let (status, body) = post_json(app(config), "/config", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "Success");
    assert_eq!(body["data"]["apiModel"], "ChatGPTUnofficialProxyAPI");
    assert_eq!(body["data"]["socksProxy"], "127.0.0.1:1080");
    assert_eq!(body["data"]["httpsProxy"], "-");
    assert_eq!(body["data"]["balance"], "-");
    assert_eq!(body["data"]["timeoutMs"], 30000);
}

#[tokio::test]
async fn test_session_under_api_prefix() {
    let (status, body) = post_json(app(token_config()), "/api/session", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "Success");
    assert_eq!(body["data"]["auth"], false);
    assert_eq!(body["data"]["model"], "ChatGPTUnofficialProxyAPI");
}

#[tokio::test]
async fn test_chat_process_streams_lines() {
    let server = MockServer::start().await;
    let frames = ["Hi", "Hi there"]
        .iter()
        .map(|text| {
            json!({
                "message": { "id": "m-1", "content": { "parts": [text] } },
                "conversation_id": "conv-1"
            })
        })
        .map(|frame| format!("data: {}\n\n", frame))
        .collect::<String>()
        + "data: [DONE]\n\n";

    Mock::given(method("POST"))
        .and(path("/api/conversation"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(frames, "text/event-stream"))
        .mount(&server)
        .await;

    let config = RelayConfig {
        api_reverse_proxy: Some(format!("{}/api/conversation", server.uri())),
        ..token_config()
    };

    let (status, body) = post_json(
        app(config),
        "/chat-process",
        json!({ "prompt": "hello", "options": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let lines: Vec<ChatMessage> = body
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let texts: Vec<_> = lines.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["Hi", "Hi there", "Hi there"]);

    let last = lines.last().unwrap();
    assert_eq!(last.id, "m-1");
    assert_eq!(last.conversation_id.as_deref(), Some("conv-1"));
}

#[tokio::test]
async fn test_chat_process_failure_is_last_line() {
    let (status, body) = post_json(
        app(token_config()),
        "/api/chat-process",
        json!({ "prompt": "hello", "engine": "BingChat" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let last = body.lines().last().unwrap();
    let result: ChatResult = serde_json::from_str(last).unwrap();
    let ChatResult::Fail { message } = result else {
        panic!("expected failure, got {}", last);
    };
    assert!(message.contains("BING_COOKIE"));

    let raw: Value = serde_json::from_str(last).unwrap();
    assert_eq!(raw["status"], "Fail");
}

#[tokio::test]
async fn test_chat_process_rejects_empty_prompt() {
    let (status, body) = post_json(app(token_config()), "/chat-process", json!({ "prompt": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "Fail");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = app(token_config()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(doc["paths"]["/chat-process"].is_object());
}
