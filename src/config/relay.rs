//! Backend credentials and networking options read from the process environment

use crate::error::{AppError, Result};
use config::{Config, Environment};
use serde::{Deserialize, Serialize};

/// Timeout applied when `TIMEOUT_MS` is absent or not a number
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Recognized relay options. Field names match the lowercased environment keys.
///
/// Every value is kept as the raw string it was configured with; empty strings
/// count as unset, see the accessors.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_access_token: Option<String>,
    #[serde(default)]
    pub bing_cookie: Option<String>,
    #[serde(default)]
    pub openai_api_base_url: Option<String>,
    #[serde(default)]
    pub openai_api_model: Option<String>,
    #[serde(default)]
    pub api_reverse_proxy: Option<String>,
    #[serde(default)]
    pub socks_proxy_host: Option<String>,
    #[serde(default)]
    pub socks_proxy_port: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
    #[serde(default)]
    pub all_proxy: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<String>,
    #[serde(default)]
    pub chat_engine: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RelayConfig {
    /// Read the relay options from the process environment.
    ///
    /// Call `dotenvy::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let config = Config::builder()
            .add_source(Environment::default())
            .build()?;
        let relay: RelayConfig = config.try_deserialize()?;
        Ok(relay)
    }

    /// Startup precondition: at least one of the API key and the access token.
    pub fn validate(&self) -> Result<()> {
        if self.api_key().is_none() && self.access_token().is_none() {
            return Err(AppError::MissingCredential(
                "Missing OPENAI_API_KEY or OPENAI_ACCESS_TOKEN environment variable".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.openai_api_key)
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.openai_access_token)
    }

    pub fn bing_cookie(&self) -> Option<&str> {
        non_empty(&self.bing_cookie)
    }

    pub fn api_base_url(&self) -> Option<&str> {
        non_empty(&self.openai_api_base_url).map(|url| url.trim_end_matches('/'))
    }

    pub fn api_model(&self) -> Option<&str> {
        non_empty(&self.openai_api_model)
    }

    pub fn reverse_proxy(&self) -> Option<&str> {
        non_empty(&self.api_reverse_proxy)
    }

    /// SOCKS proxy host and port, only when both are configured
    pub fn socks_proxy(&self) -> Option<(&str, &str)> {
        match (non_empty(&self.socks_proxy_host), non_empty(&self.socks_proxy_port)) {
            (Some(host), Some(port)) => Some((host, port)),
            _ => None,
        }
    }

    /// `HTTPS_PROXY`, falling back to `ALL_PROXY`
    pub fn https_proxy(&self) -> Option<&str> {
        non_empty(&self.https_proxy).or_else(|| non_empty(&self.all_proxy))
    }

    /// Per-request timeout; `0` means no timeout
    pub fn timeout_ms(&self) -> u64 {
        non_empty(&self.timeout_ms)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Engine used when a request does not name one
    pub fn default_engine(&self) -> Option<&str> {
        non_empty(&self.chat_engine)
    }
}
