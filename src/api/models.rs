//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::backend::{BackendKind, ConversationContext};
use crate::relay::{ChatRequest, ModelConfig};

/// Chat request sent by the front end
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatProcessRequest {
    /// The user message
    pub prompt: String,

    /// Continuation returned with the previous reply
    #[serde(default)]
    pub options: Option<ConversationContext>,

    /// System message, honoured by the official API only
    #[serde(default)]
    pub system_message: Option<String>,

    /// Engine name: `ChatGPTAPI`, `ChatGPTUnofficialProxyAPI` or `BingChat`
    #[serde(default)]
    pub engine: Option<String>,
}

impl ChatProcessRequest {
    pub fn into_chat_request(self, ip: Option<String>) -> ChatRequest {
        ChatRequest {
            message: self.prompt,
            last_context: self.options,
            system_message: self.system_message,
            ip,
            engine: self.engine,
        }
    }
}

/// Response of `POST /config`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub status: String,
    pub message: Option<String>,
    pub data: ModelConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SessionData {
    pub auth: bool,
    pub model: BackendKind,
}

/// Response of `POST /session`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SessionResponse {
    pub status: String,
    pub message: Option<String>,
    pub data: SessionData,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: BackendKind,
}
