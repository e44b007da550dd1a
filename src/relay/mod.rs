//! Relay: backend selection, message forwarding and configuration reporting

pub mod current;
pub mod forwarder;
pub mod reporter;
pub mod selector;

pub use current::CurrentBackend;
pub use forwarder::{
    dispatch, error_code_message, ChatRequest, ChatResult, ProgressSink, FALLBACK_ERROR_MESSAGE,
};
pub use reporter::{ModelConfig, PLACEHOLDER};
pub use selector::Selector;

use std::sync::Arc;
use tracing::warn;

use crate::backend::{BackendKind, ConversationStore};
use crate::config::RelayConfig;

/// Entry point used by the host service
#[derive(Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
    current: CurrentBackend,
    selector: Selector,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let config = Arc::new(config);
        let current = CurrentBackend::default();
        let selector = Selector::new(config.clone(), current.clone(), ConversationStore::new());
        Self {
            config,
            current,
            selector,
        }
    }

    pub fn config_ref(&self) -> &RelayConfig {
        &self.config
    }

    /// Backend kind of the most recent successful selection
    pub fn current_backend(&self) -> BackendKind {
        self.current.get()
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Forward one message and return its terminal result.
    ///
    /// Never fails: selection and backend errors come back as `ChatResult::Fail`.
    pub async fn forward(&self, request: ChatRequest, on_progress: Option<ProgressSink>) -> ChatResult {
        let engine = request
            .engine
            .as_deref()
            .or_else(|| self.config.default_engine())
            .map(String::from);

        let (backend, _) = match self.selector.select(engine.as_deref()) {
            Ok(selected) => selected,
            Err(e) => {
                warn!(engine = ?engine, error = %e, "Backend selection failed");
                return ChatResult::from_error(&e);
            }
        };

        dispatch(backend.as_ref(), request, self.config.timeout_ms(), on_progress).await
    }

    /// Current model configuration, balance included
    pub async fn config(&self) -> ModelConfig {
        reporter::model_config(&self.config, self.current.get()).await
    }
}
