//! Official chat completion API backend
//! Streams `/chat/completions` and rebuilds history from the conversation store

use async_trait::async_trait;
use chrono::Utc;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tiktoken_rs::CoreBPE;
use tracing::{debug, error};
use uuid::Uuid;

use crate::backend::store::{ConversationStore, StoredMessage};
use crate::backend::traits::{ChatBackend, ProgressFn};
use crate::backend::transport::NetworkTransport;
use crate::backend::types::{
    BackendKind, ChatMessage, SendContext, SendOptions, TokenBudget, INCOMPLETE_STREAM,
};
use crate::error::{AppError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Budget for large-capacity models with the large-context marker
pub const LARGE_CONTEXT_BUDGET: TokenBudget = TokenBudget::new(32768, 8192);
/// Budget for large-capacity models
pub const LARGE_MODEL_BUDGET: TokenBudget = TokenBudget::new(8192, 2048);

static BPE: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::cl100k_base().ok());

/// Widened budget for `gpt-4` family models, `None` keeps the client default
pub fn token_budget_for_model(model: &str) -> Option<TokenBudget> {
    let model = model.to_lowercase();
    if !model.contains("gpt-4") {
        return None;
    }
    if model.contains("32k") {
        Some(LARGE_CONTEXT_BUDGET)
    } else {
        Some(LARGE_MODEL_BUDGET)
    }
}

fn count_tokens(text: &str) -> usize {
    match BPE.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count().div_ceil(4),
    }
}

fn default_system_message() -> String {
    format!(
        "You are ChatGPT, a large language model trained by OpenAI. Answer as concisely as possible.\n\
         Knowledge cutoff: 2021-09-01\n\
         Current date: {}",
        Utc::now().format("%Y-%m-%d")
    )
}

/// Options for constructing an official API client
#[derive(Debug, Clone)]
pub struct OfficialApiOptions {
    pub api_key: String,
    pub api_base_url: String,
    pub model: String,
    pub budget: Option<TokenBudget>,
    pub transport: NetworkTransport,
}

impl OfficialApiOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            budget: None,
            transport: NetworkTransport::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    fn tokens(&self) -> usize {
        count_tokens(&self.content) + 4
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f32,
    top_p: f32,
    presence_penalty: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    id: String,
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Client for the official chat completion API
pub struct OfficialApiBackend {
    client: Client,
    api_key: String,
    api_base_url: String,
    model: String,
    budget: TokenBudget,
    store: ConversationStore,
}

impl OfficialApiBackend {
    pub fn new(options: OfficialApiOptions, store: ConversationStore) -> Result<Self> {
        Ok(Self {
            client: options.transport.build_client()?,
            api_key: options.api_key,
            api_base_url: options.api_base_url.trim_end_matches('/').to_string(),
            model: options.model,
            budget: options.budget.unwrap_or_default(),
            store,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Assemble system message, as much history as fits, and the new user message.
    /// Returns the messages and the response token allowance.
    pub fn build_messages(
        &self,
        text: &str,
        system_message: &str,
        parent_message_id: Option<&str>,
    ) -> (Vec<ApiMessage>, usize) {
        let max_prompt_tokens = self
            .budget
            .max_model_tokens
            .saturating_sub(self.budget.max_response_tokens);

        let system = ApiMessage::new("system", system_message);
        let user = ApiMessage::new("user", text);
        let mut prompt_tokens = system.tokens() + user.tokens();

        let mut history = Vec::new();
        if let Some(parent_id) = parent_message_id {
            for stored in self.store.ancestors(parent_id) {
                let message = ApiMessage::new(&stored.role, stored.text);
                let tokens = message.tokens();
                if prompt_tokens + tokens > max_prompt_tokens {
                    break;
                }
                prompt_tokens += tokens;
                history.push(message);
            }
        }
        history.reverse();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system);
        messages.extend(history);
        messages.push(user);

        let max_tokens = self
            .budget
            .max_model_tokens
            .saturating_sub(prompt_tokens)
            .min(self.budget.max_response_tokens)
            .max(1);

        (messages, max_tokens)
    }

    async fn upstream_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        error!(status = %status, "Official API returned an error");
        AppError::backend(
            Some(status.as_u16()),
            format!("OpenAI error {}: {}", status.as_u16(), detail),
        )
    }
}

#[async_trait]
impl ChatBackend for OfficialApiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ChatGptApi
    }

    async fn send_message(
        &self,
        text: &str,
        options: SendOptions,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<ChatMessage> {
        let parent_message_id = match &options.context {
            SendContext::ParentMessage(id) => Some(id.clone()),
            _ => None,
        };
        let system_message = options
            .system_message
            .clone()
            .unwrap_or_else(default_system_message);

        let (messages, max_tokens) =
            self.build_messages(text, &system_message, parent_message_id.as_deref());

        let user_message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            role: "user".to_string(),
            text: text.to_string(),
            parent_message_id,
        };

        let url = format!("{}/chat/completions", self.api_base_url);
        debug!(url = %url, model = %self.model, messages = messages.len(), max_tokens, "Sending chat completion request");

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.8,
            top_p: 1.0,
            presence_penalty: 1.0,
            max_tokens,
            stream: true,
        };

        let request = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&request);
        let response = options.apply_timeout(request).send().await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let mut result = ChatMessage::assistant(Uuid::new_v4().to_string());
        result.parent_message_id = Some(user_message.id.clone());

        let mut finished = false;
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| AppError::backend(None, format!("Stream interrupted: {}", e)))?;

            if event.data.trim() == "[DONE]" {
                finished = true;
                break;
            }

            let value: serde_json::Value = match serde_json::from_str(&event.data) {
                Ok(value) => value,
                Err(e) => {
                    debug!(error = %e, "Skipping unparsable stream frame");
                    continue;
                }
            };
            let Ok(chunk) = serde_json::from_value::<StreamChunk>(value.clone()) else {
                continue;
            };

            result.id = chunk.id;
            if let Some(content) = chunk.choices.first().and_then(|c| c.delta.content.as_deref()) {
                result.text.push_str(content);
                result.detail = Some(value);
                if let Some(progress) = on_progress {
                    progress(&result);
                }
            } else {
                result.detail = Some(value);
            }
        }

        if !finished {
            return Err(AppError::backend(None, INCOMPLETE_STREAM));
        }

        result.text = result.text.trim().to_string();

        self.store.insert(StoredMessage {
            id: result.id.clone(),
            role: "assistant".to_string(),
            text: result.text.clone(),
            parent_message_id: Some(user_message.id.clone()),
        });
        self.store.insert(user_message);

        Ok(result)
    }
}
