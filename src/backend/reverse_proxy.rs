//! Reverse-proxied web conversation backend, authenticated by an access token

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use crate::backend::traits::{ChatBackend, ProgressFn};
use crate::backend::transport::NetworkTransport;
use crate::backend::types::{BackendKind, ChatMessage, SendContext, SendOptions, INCOMPLETE_STREAM};
use crate::error::{AppError, Result};

pub const DEFAULT_REVERSE_PROXY_URL: &str = "https://bypass.churchless.tech/api/conversation";
const CONVERSATION_MODEL: &str = "text-davinci-002-render-sha";

#[derive(Debug, Clone)]
pub struct ReverseProxyOptions {
    pub access_token: String,
    pub api_reverse_proxy_url: String,
    pub transport: NetworkTransport,
}

impl ReverseProxyOptions {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_reverse_proxy_url: DEFAULT_REVERSE_PROXY_URL.to_string(),
            transport: NetworkTransport::Direct,
        }
    }
}

#[derive(Debug, Serialize)]
struct ConversationRequest {
    action: &'static str,
    messages: Vec<serde_json::Value>,
    model: &'static str,
    parent_message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationFrame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    id: String,
    #[serde(default)]
    content: FrameContent,
}

#[derive(Debug, Default, Deserialize)]
struct FrameContent {
    #[serde(default)]
    parts: Vec<String>,
}

/// Client for the reverse-proxy conversation endpoint
pub struct ReverseProxyBackend {
    client: Client,
    access_token: String,
    url: String,
}

impl ReverseProxyBackend {
    pub fn new(options: ReverseProxyOptions) -> Result<Self> {
        Ok(Self {
            client: options.transport.build_client()?,
            access_token: options.access_token,
            url: options.api_reverse_proxy_url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.access_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

#[async_trait]
impl ChatBackend for ReverseProxyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ChatGptUnofficialProxyApi
    }

    async fn send_message(
        &self,
        text: &str,
        options: SendOptions,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<ChatMessage> {
        let (conversation_id, parent_message_id) = match &options.context {
            SendContext::Conversation(context) => (
                context.conversation_id.clone(),
                context.parent_message_id.clone(),
            ),
            SendContext::ParentMessage(id) => (None, Some(id.clone())),
            SendContext::Fresh => (None, None),
        };

        let message_id = Uuid::new_v4().to_string();
        let request = ConversationRequest {
            action: "next",
            messages: vec![json!({
                "id": message_id,
                "role": "user",
                "content": { "content_type": "text", "parts": [text] },
            })],
            model: CONVERSATION_MODEL,
            parent_message_id: parent_message_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            conversation_id: conversation_id.clone(),
        };

        debug!(url = %self.url, conversation = ?conversation_id, "Sending conversation request");

        let request = self
            .client
            .post(&self.url)
            .headers(self.get_headers())
            .json(&request);
        let response = options.apply_timeout(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Reverse proxy returned an error");
            return Err(AppError::backend(
                Some(status.as_u16()),
                format!("ChatGPT error {}: {}", status.as_u16(), body),
            ));
        }

        let mut result = ChatMessage::assistant(Uuid::new_v4().to_string());
        result.parent_message_id = Some(message_id);
        result.conversation_id = conversation_id;

        let mut finished = false;
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| AppError::backend(None, format!("Stream interrupted: {}", e)))?;

            if event.data.trim() == "[DONE]" {
                finished = true;
                break;
            }

            let Ok(value) = serde_json::from_str::<serde_json::Value>(&event.data) else {
                continue;
            };
            let Ok(frame) = serde_json::from_value::<ConversationFrame>(value.clone()) else {
                continue;
            };

            if let Some(id) = frame.conversation_id {
                result.conversation_id = Some(id);
            }
            let Some(message) = frame.message else {
                continue;
            };

            result.id = message.id;
            if let Some(partial) = message.content.parts.into_iter().next() {
                result.text = partial;
                result.detail = Some(value);
                if let Some(progress) = on_progress {
                    progress(&result);
                }
            }
        }

        if !finished {
            return Err(AppError::backend(None, INCOMPLETE_STREAM));
        }

        Ok(result)
    }
}
