//! Web chat backend authenticated by a session cookie
//!
//! A conversation is created over HTTP. Each message then opens a websocket to
//! the chat hub, performs the JSON protocol handshake and sends one invocation.
//! The hub answers with JSON records delimited by the `0x1e` record separator:
//! type `1` carries partial text, type `2` the final item, type `3` closes the
//! invocation and type `6` is a keep-alive ping.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE},
    Client,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{
    self, client::IntoClientRequest, http::HeaderValue as WsHeaderValue, Message,
};
use tracing::{debug, error, warn};

use crate::backend::traits::{ChatBackend, ProgressFn};
use crate::backend::transport::NetworkTransport;
use crate::backend::types::{
    BackendKind, ChatMessage, ConversationContext, SendContext, SendOptions, INCOMPLETE_STREAM,
};
use crate::error::{AppError, Result};

pub const DEFAULT_WEB_CHAT_URL: &str = "https://www.bing.com";
pub const DEFAULT_CHAT_HUB_URL: &str = "wss://sydney.bing.com/sydney/ChatHub";

const RECORD_SEPARATOR: u8 = 0x1e;

#[derive(Debug, Clone)]
pub struct WebChatOptions {
    pub cookie: String,
    pub base_url: String,
    pub hub_url: String,
    pub transport: NetworkTransport,
}

impl WebChatOptions {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            base_url: DEFAULT_WEB_CHAT_URL.to_string(),
            hub_url: DEFAULT_CHAT_HUB_URL.to_string(),
            transport: NetworkTransport::Direct,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedConversation {
    conversation_id: String,
    client_id: String,
    conversation_signature: String,
    #[serde(default)]
    result: Option<InvocationResult>,
}

#[derive(Debug, Deserialize)]
struct InvocationResult {
    #[serde(default)]
    value: String,
    #[serde(default)]
    message: Option<String>,
}

/// Session state needed for one invocation
#[derive(Debug, Clone)]
struct Session {
    conversation_id: String,
    client_id: String,
    conversation_signature: String,
    invocation_id: u32,
}

impl Session {
    fn from_context(context: ConversationContext) -> Option<Self> {
        Some(Self {
            conversation_id: context.conversation_id?,
            client_id: context.client_id?,
            conversation_signature: context.conversation_signature?,
            invocation_id: context.invocation_id.unwrap_or(0),
        })
    }
}

/// Serialize one hub record, separator included
fn record(value: &Value) -> String {
    format!("{}{}", value, char::from(RECORD_SEPARATOR))
}

/// Split complete records off the front of `buffer`, leaving any partial record.
///
/// Splitting happens on raw bytes, so a character spread over two frames is only
/// decoded once its record is complete.
pub fn drain_records(buffer: &mut Vec<u8>) -> Result<Vec<String>> {
    let mut records = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == RECORD_SEPARATOR) {
        let mut raw: Vec<u8> = buffer.drain(..=pos).collect();
        raw.pop();
        let text = String::from_utf8(raw)
            .map_err(|e| AppError::backend(None, format!("Invalid chat hub record: {}", e)))?;
        let text = text.trim();
        if !text.is_empty() {
            records.push(text.to_string());
        }
    }
    Ok(records)
}

fn hub_error(e: tungstenite::Error) -> AppError {
    AppError::backend(None, format!("Chat hub error: {}", e))
}

/// Text of the last bot-authored message in a list of hub messages
fn bot_text(messages: Option<&Value>) -> Option<(String, Option<String>)> {
    messages?
        .as_array()?
        .iter()
        .rev()
        .find(|m| m.get("author").and_then(Value::as_str) == Some("bot"))
        .and_then(|m| {
            let text = m.get("text").and_then(Value::as_str)?.to_string();
            let id = m.get("messageId").and_then(Value::as_str).map(String::from);
            Some((text, id))
        })
}

/// Client for the web chat API
pub struct WebChatBackend {
    client: Client,
    cookie: String,
    base_url: String,
    hub_url: String,
}

impl WebChatBackend {
    pub fn new(options: WebChatOptions) -> Result<Self> {
        if options.transport != NetworkTransport::Direct {
            warn!(transport = ?options.transport, "Chat hub websocket connects directly; proxy applies to conversation creation only");
        }
        Ok(Self {
            client: options.transport.build_client()?,
            cookie: options.cookie,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            hub_url: options.hub_url,
        })
    }

    fn cookie_header(&self) -> String {
        if self.cookie.contains(';') {
            self.cookie.clone()
        } else {
            format!("_U={}", self.cookie)
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.cookie_header()) {
            headers.insert(COOKIE, value);
        }
        headers
    }

    async fn create_conversation(&self, options: &SendOptions) -> Result<Session> {
        let url = format!("{}/turing/conversation/create", self.base_url);
        debug!(url = %url, "Creating web chat conversation");

        let request = self.client.get(&url).headers(self.get_headers());
        let response = options.apply_timeout(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Web chat conversation creation failed");
            return Err(AppError::backend(
                Some(status.as_u16()),
                format!("Unable to create conversation ({}): {}", status.as_u16(), body),
            ));
        }

        let created: CreatedConversation = response.json().await.map_err(|e| {
            AppError::backend(None, format!("Unexpected conversation response: {}", e))
        })?;

        if let Some(result) = created.result.filter(|r| r.value != "Success") {
            return Err(AppError::backend(
                None,
                result
                    .message
                    .unwrap_or_else(|| format!("Unable to create conversation: {}", result.value)),
            ));
        }

        Ok(Session {
            conversation_id: created.conversation_id,
            client_id: created.client_id,
            conversation_signature: created.conversation_signature,
            invocation_id: 0,
        })
    }

    fn invocation(text: &str, session: &Session) -> String {
        record(&json!({
            "arguments": [{
                "source": "cib",
                "optionsSets": ["nlu_direct_response_filter", "deepleo", "enable_debug_commands", "disable_emoji_spoken_text", "responsible_ai_policy_235", "enablemm"],
                "isStartOfSession": session.invocation_id == 0,
                "message": {
                    "author": "user",
                    "inputMethod": "Keyboard",
                    "text": text,
                    "messageType": "Chat",
                },
                "conversationSignature": session.conversation_signature,
                "participant": { "id": session.client_id },
                "conversationId": session.conversation_id,
            }],
            "invocationId": session.invocation_id.to_string(),
            "target": "chat",
            "type": 4,
        }))
    }

    /// Run one invocation over the hub websocket, filling `result` as records arrive
    async fn exchange(
        &self,
        text: &str,
        session: &Session,
        on_progress: Option<ProgressFn<'_>>,
        result: &mut ChatMessage,
    ) -> Result<()> {
        let mut request = self.hub_url.as_str().into_client_request().map_err(hub_error)?;
        if let Ok(value) = WsHeaderValue::from_str(&self.cookie_header()) {
            request.headers_mut().insert("cookie", value);
        }

        let (mut socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(hub_error)?;
        socket
            .send(Message::Text(record(&json!({ "protocol": "json", "version": 1 }))))
            .await
            .map_err(hub_error)?;

        let mut buffer = Vec::new();
        let mut invoked = false;
        let mut finished = false;

        'hub: while let Some(message) = socket.next().await {
            match message.map_err(hub_error)? {
                Message::Text(chunk) => buffer.extend_from_slice(chunk.as_bytes()),
                Message::Binary(bytes) => buffer.extend_from_slice(&bytes),
                Message::Close(_) => break,
                _ => continue,
            }

            for record_text in drain_records(&mut buffer)? {
                let Ok(frame) = serde_json::from_str::<Value>(&record_text) else {
                    continue;
                };
                match frame.get("type").and_then(Value::as_u64) {
                    None if !invoked => {
                        socket
                            .send(Message::Text(record(&json!({ "type": 6 }))))
                            .await
                            .map_err(hub_error)?;
                        socket
                            .send(Message::Text(Self::invocation(text, session)))
                            .await
                            .map_err(hub_error)?;
                        invoked = true;
                    }
                    Some(1) => {
                        let messages = frame.pointer("/arguments/0/messages");
                        if let Some((partial, id)) = bot_text(messages) {
                            result.text = partial;
                            if let Some(id) = id {
                                result.id = id;
                            }
                            if let Some(progress) = on_progress {
                                progress(result);
                            }
                        }
                    }
                    Some(2) => {
                        let item = frame.get("item").cloned().unwrap_or(Value::Null);
                        if let Some(status) = item.get("result") {
                            if status.get("value").and_then(Value::as_str) != Some("Success") {
                                let message = status
                                    .get("message")
                                    .and_then(Value::as_str)
                                    .unwrap_or("Web chat invocation failed");
                                return Err(AppError::backend(None, message));
                            }
                        }
                        if let Some((text, id)) = bot_text(item.get("messages")) {
                            result.text = text;
                            if let Some(id) = id {
                                result.id = id;
                            }
                        }
                        result.detail = Some(item);
                        finished = true;
                        break 'hub;
                    }
                    Some(3) => {
                        finished = true;
                        break 'hub;
                    }
                    Some(6) => {
                        socket
                            .send(Message::Text(record(&json!({ "type": 6 }))))
                            .await
                            .map_err(hub_error)?;
                    }
                    Some(7) => {
                        let message = frame
                            .get("error")
                            .and_then(Value::as_str)
                            .unwrap_or("Chat hub closed the connection");
                        return Err(AppError::backend(None, message));
                    }
                    _ => {}
                }
            }
        }

        if let Err(e) = socket.close(None).await {
            debug!(error = %e, "Chat hub close failed");
        }

        if !finished {
            return Err(AppError::backend(None, INCOMPLETE_STREAM));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for WebChatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::BingChat
    }

    async fn send_message(
        &self,
        text: &str,
        options: SendOptions,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<ChatMessage> {
        let existing = match options.context.clone() {
            SendContext::Conversation(context) => Session::from_context(context),
            _ => None,
        };
        let session = match existing {
            Some(session) => session,
            None => self.create_conversation(&options).await?,
        };

        debug!(conversation = %session.conversation_id, invocation = session.invocation_id, "Sending web chat invocation");

        let mut result = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: "bot".to_string(),
            conversation_id: Some(session.conversation_id.clone()),
            client_id: Some(session.client_id.clone()),
            conversation_signature: Some(session.conversation_signature.clone()),
            invocation_id: Some(session.invocation_id + 1),
            ..Default::default()
        };

        let exchange = self.exchange(text, &session, on_progress, &mut result);
        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange).await.map_err(|_| {
                AppError::backend(
                    None,
                    format!("Web chat timed out after {} ms", timeout.as_millis()),
                )
            })??,
            None => exchange.await?,
        }

        Ok(result)
    }
}
