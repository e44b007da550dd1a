//! Backend selection from the requested engine and available credentials

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::official::{token_budget_for_model, DEFAULT_MODEL};
use crate::backend::{
    BackendKind, ChatBackend, ConversationStore, NetworkTransport, OfficialApiBackend,
    OfficialApiOptions, ReverseProxyBackend, ReverseProxyOptions, WebChatBackend, WebChatOptions,
};
use crate::config::RelayConfig;
use crate::error::{AppError, Result};
use crate::relay::current::CurrentBackend;

/// Decide which backend serves a request.
///
/// The web chat engine is only ever chosen explicitly. The official API needs
/// its key; when the key is missing the request falls through to the reverse
/// proxy, as do unset and unrecognized engine names.
pub fn resolve_kind(requested: Option<&str>, config: &RelayConfig) -> Result<BackendKind> {
    let requested = requested.map(str::trim).filter(|e| !e.is_empty());
    let kind = requested.and_then(BackendKind::from_engine);

    if let (Some(name), None) = (requested, kind) {
        warn!(engine = %name, "Unknown engine requested, using the reverse proxy");
    }

    match kind {
        Some(BackendKind::BingChat) => {
            if config.bing_cookie().is_none() {
                return Err(AppError::MissingCredential(
                    "BING_COOKIE is required for the BingChat engine".to_string(),
                ));
            }
            Ok(BackendKind::BingChat)
        }
        Some(BackendKind::ChatGptApi) if config.api_key().is_some() => Ok(BackendKind::ChatGptApi),
        other => {
            if other == Some(BackendKind::ChatGptApi) {
                debug!("OPENAI_API_KEY not set, falling through to the reverse proxy");
            }
            if config.access_token().is_none() {
                return Err(AppError::MissingCredential(
                    "OPENAI_ACCESS_TOKEN is required for the ChatGPTUnofficialProxyAPI engine"
                        .to_string(),
                ));
            }
            Ok(BackendKind::ChatGptUnofficialProxyApi)
        }
    }
}

/// Official API client options derived from configuration
pub fn official_options(config: &RelayConfig) -> Option<OfficialApiOptions> {
    let api_key = config.api_key()?;
    let mut options = OfficialApiOptions::new(api_key);

    options.model = config.api_model().unwrap_or(DEFAULT_MODEL).to_string();
    options.budget = token_budget_for_model(&options.model);
    if let Some(base_url) = config.api_base_url() {
        options.api_base_url = format!("{}/v1", base_url);
    }
    options.transport = NetworkTransport::from_config(config);

    Some(options)
}

/// Reverse proxy client options derived from configuration
pub fn reverse_proxy_options(config: &RelayConfig) -> Option<ReverseProxyOptions> {
    let mut options = ReverseProxyOptions::new(config.access_token()?);
    if let Some(url) = config.reverse_proxy() {
        options.api_reverse_proxy_url = url.to_string();
    }
    options.transport = NetworkTransport::from_config(config);
    Some(options)
}

/// Builds one backend client per call and records the selection
#[derive(Clone)]
pub struct Selector {
    config: Arc<RelayConfig>,
    current: CurrentBackend,
    store: ConversationStore,
}

impl Selector {
    pub fn new(config: Arc<RelayConfig>, current: CurrentBackend, store: ConversationStore) -> Self {
        Self {
            config,
            current,
            store,
        }
    }

    /// Construct the client for `requested` and mark its kind as current
    pub fn select(&self, requested: Option<&str>) -> Result<(Arc<dyn ChatBackend>, BackendKind)> {
        let kind = resolve_kind(requested, &self.config)?;
        let missing = || AppError::MissingCredential(format!("No credential configured for {}", kind));

        let backend: Arc<dyn ChatBackend> = match kind {
            BackendKind::ChatGptApi => {
                let options = official_options(&self.config).ok_or_else(missing)?;
                Arc::new(OfficialApiBackend::new(options, self.store.clone())?)
            }
            BackendKind::ChatGptUnofficialProxyApi => {
                let options = reverse_proxy_options(&self.config).ok_or_else(missing)?;
                Arc::new(ReverseProxyBackend::new(options)?)
            }
            BackendKind::BingChat => {
                let cookie = self.config.bing_cookie().ok_or_else(missing)?;
                Arc::new(WebChatBackend::new(WebChatOptions::new(cookie))?)
            }
        };

        self.current.set(kind);
        info!(backend = %kind, "Backend selected");

        Ok((backend, kind))
    }
}
