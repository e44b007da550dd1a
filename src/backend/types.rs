//! Shapes shared by every chat backend

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

/// Backend selected for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ToSchema)]
pub enum BackendKind {
    /// Official chat completion API, authenticated by an API key
    #[serde(rename = "ChatGPTAPI")]
    ChatGptApi,
    /// Reverse-proxied web conversation API, authenticated by an access token
    #[serde(rename = "ChatGPTUnofficialProxyAPI")]
    ChatGptUnofficialProxyApi,
    /// Web chat API, authenticated by a session cookie
    #[serde(rename = "BingChat")]
    BingChat,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ChatGptApi => "ChatGPTAPI",
            BackendKind::ChatGptUnofficialProxyApi => "ChatGPTUnofficialProxyAPI",
            BackendKind::BingChat => "BingChat",
        }
    }

    /// Parse an engine name as sent by the front end
    pub fn from_engine(engine: &str) -> Option<Self> {
        match engine.trim() {
            "ChatGPTAPI" => Some(BackendKind::ChatGptApi),
            "ChatGPTUnofficialProxyAPI" => Some(BackendKind::ChatGptUnofficialProxyApi),
            "BingChat" => Some(BackendKind::BingChat),
            _ => None,
        }
    }

    /// Shape a continuation into what this backend accepts.
    ///
    /// The official API rebuilds history from a parent message id alone; the other
    /// backends keep conversation state upstream and need the context verbatim.
    pub fn shape_context(&self, context: ConversationContext) -> SendContext {
        match self {
            BackendKind::ChatGptApi => match context.parent_message_id {
                Some(id) => SendContext::ParentMessage(id),
                None => SendContext::Fresh,
            },
            BackendKind::ChatGptUnofficialProxyApi | BackendKind::BingChat => {
                SendContext::Conversation(context)
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuation returned by a previous call and echoed back by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<u32>,
}

/// Continuation in the form a specific backend consumes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SendContext {
    #[default]
    Fresh,
    ParentMessage(String),
    Conversation(ConversationContext),
}

/// Reported when an upstream stream closes before its terminal frame
pub const INCOMPLETE_STREAM: &str = "Stream ended before the final message";

/// Per-call options handed to a backend
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// `None` when the call may run unbounded
    pub timeout: Option<Duration>,
    pub system_message: Option<String>,
    pub context: SendContext,
}

impl SendOptions {
    /// A timeout of `0` disables the per-request timeout
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            system_message: None,
            context: SendContext::Fresh,
        }
    }

    /// Apply the timeout, if any, to an outgoing request
    pub fn apply_timeout(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }
}

/// Normalized message produced by any backend, both for progress and final results
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<u32>,
    /// Raw backend payload of the last frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
}

impl ChatMessage {
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: "assistant".to_string(),
            ..Default::default()
        }
    }

    /// Continuation to send with the next turn of this conversation
    pub fn continuation(&self) -> ConversationContext {
        ConversationContext {
            conversation_id: self.conversation_id.clone(),
            parent_message_id: Some(self.id.clone()),
            client_id: self.client_id.clone(),
            conversation_signature: self.conversation_signature.clone(),
            invocation_id: self.invocation_id,
        }
    }
}

/// Token budget for the official API: prompt plus response, and response alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub max_model_tokens: usize,
    pub max_response_tokens: usize,
}

impl TokenBudget {
    pub const fn new(max_model_tokens: usize, max_response_tokens: usize) -> Self {
        Self {
            max_model_tokens,
            max_response_tokens,
        }
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(4000, 1000)
    }
}
