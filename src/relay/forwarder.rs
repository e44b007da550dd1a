//! Message forwarding and error normalization

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::backend::{BackendKind, ChatBackend, ChatMessage, ConversationContext, SendOptions};
use crate::error::AppError;

/// Message returned when a failure carries neither a known code nor any text
pub const FALLBACK_ERROR_MESSAGE: &str = "Please check the back-end console";

/// Caller-supplied sink receiving partial responses in order
pub type ProgressSink = Arc<dyn Fn(&ChatMessage) + Send + Sync>;

/// Localized message for a known upstream status code
pub fn error_code_message(code: u16) -> Option<&'static str> {
    match code {
        401 => Some("[OpenAI] 提供错误的API密钥 | Incorrect API key provided"),
        403 => Some("[OpenAI] 服务器拒绝访问，请稍后再试 | Server refused to access, please try again later"),
        500 => Some("[OpenAI] 服务器繁忙，请稍后再试 | Internal Server Error"),
        502 => Some("[OpenAI] 错误的网关 |  Bad Gateway"),
        503 => Some("[OpenAI] 服务器繁忙，请稍后再试 | Server is busy, please try again later"),
        504 => Some("[OpenAI] 网关超时 | Gateway Time-out"),
        _ => None,
    }
}

/// One message to forward
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub last_context: Option<ConversationContext>,
    pub system_message: Option<String>,
    pub ip: Option<String>,
    pub engine: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Terminal outcome of a forward call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status")]
pub enum ChatResult {
    Success { data: ChatMessage },
    Fail { message: String },
}

impl ChatResult {
    /// Map a backend failure to the message shown to the user.
    ///
    /// A known status code always wins over the error's own text.
    pub fn from_error(error: &AppError) -> Self {
        let message = error
            .status_code()
            .and_then(error_code_message)
            .map(String::from)
            .or_else(|| error.backend_message())
            .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());
        ChatResult::Fail { message }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChatResult::Success { .. })
    }
}

/// Send one request through an already selected backend
pub async fn dispatch(
    backend: &dyn ChatBackend,
    request: ChatRequest,
    timeout_ms: u64,
    on_progress: Option<ProgressSink>,
) -> ChatResult {
    let kind = backend.kind();
    let mut options = SendOptions::new(timeout_ms);

    if kind == BackendKind::ChatGptApi {
        options.system_message = request
            .system_message
            .filter(|m| !m.trim().is_empty());
    }
    if let Some(context) = request.last_context {
        options.context = kind.shape_context(context);
    }

    info!(
        ip = %request.ip.as_deref().unwrap_or("unknown"),
        backend = %kind,
        prompt = %request.message,
        "Forwarding message"
    );

    match backend
        .send_message(&request.message, options, on_progress.as_deref())
        .await
    {
        Ok(message) => {
            debug!(backend = %kind, answer = %message.text, "Backend replied");
            ChatResult::Success { data: message }
        }
        Err(e) => {
            warn!(backend = %kind, status = ?e.status_code(), error = %e, "Backend call failed");
            ChatResult::from_error(&e)
        }
    }
}
