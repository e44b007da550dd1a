//! HTTP request handlers

use crate::api::models::{
    ChatProcessRequest, ConfigResponse, HealthResponse, SessionData, SessionResponse,
};
use crate::backend::ChatMessage;
use crate::error::AppError;
use crate::relay::{ChatResult, ProgressSink};
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Caller address from proxy headers
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Forward a chat message, streaming progress as newline-separated JSON
#[utoipa::path(
    post,
    path = "/chat-process",
    tag = "Chat",
    request_body = ChatProcessRequest,
    responses(
        (status = 200, description = "Newline-separated ChatMessage records; the last line is the final message or a Fail result", content_type = "application/octet-stream"),
        (status = 400, description = "Empty prompt")
    )
)]
pub async fn chat_process(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatProcessRequest>,
) -> Response {
    if request.prompt.trim().is_empty() {
        return AppError::InvalidRequest("prompt must not be empty".to_string()).into_response();
    }

    let request = request.into_chat_request(client_ip(&headers));
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    let progress_tx = tx.clone();
    let sink: ProgressSink = Arc::new(move |message: &ChatMessage| {
        if let Ok(line) = serde_json::to_string(message) {
            let _ = progress_tx.send(line);
        }
    });

    let relay = state.relay.clone();
    tokio::spawn(async move {
        let result = relay.forward(request, Some(sink)).await;
        let line = match &result {
            ChatResult::Success { data } => serde_json::to_string(data),
            ChatResult::Fail { .. } => serde_json::to_string(&result),
        };
        match line {
            Ok(line) => {
                let _ = tx.send(line);
            }
            Err(e) => warn!(error = %e, "Failed to encode chat result"),
        }
    });

    let stream = futures::stream::unfold((rx, true), |(mut rx, first)| async move {
        let line = rx.recv().await?;
        let chunk = if first { line } else { format!("\n{}", line) };
        Some((Ok::<_, Infallible>(chunk), (rx, false)))
    });

    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Report backend, timeout, proxies and balance
#[utoipa::path(
    post,
    path = "/config",
    tag = "Config",
    responses((status = 200, body = ConfigResponse))
)]
pub async fn config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let data = state.relay.config().await;
    info!(model = %data.api_model, balance = %data.balance, "Reporting model config");

    Json(ConfigResponse {
        status: "Success".to_string(),
        message: None,
        data,
    })
}

/// Session information for the front end
#[utoipa::path(
    post,
    path = "/session",
    tag = "Config",
    responses((status = 200, body = SessionResponse))
)]
pub async fn session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(SessionResponse {
        status: "Success".to_string(),
        message: None,
        data: SessionData {
            auth: false,
            model: state.relay.current_backend(),
        },
    })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.relay.current_backend(),
    })
}
