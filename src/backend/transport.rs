//! Outbound network transport: direct, HTTPS proxy or SOCKS proxy

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{AppError, Result};

/// How backend clients reach the network. Exactly one mechanism is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkTransport {
    Direct,
    Socks { host: String, port: String },
    HttpsProxy(String),
}

impl NetworkTransport {
    /// SOCKS when host and port are both set, else the HTTPS/ALL proxy, else direct
    pub fn from_config(config: &RelayConfig) -> Self {
        if let Some((host, port)) = config.socks_proxy() {
            NetworkTransport::Socks {
                host: host.to_string(),
                port: port.to_string(),
            }
        } else if let Some(url) = config.https_proxy() {
            NetworkTransport::HttpsProxy(url.to_string())
        } else {
            NetworkTransport::Direct
        }
    }

    /// Install the proxy on a client builder
    pub fn apply(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        let proxy = match self {
            NetworkTransport::Direct => return Ok(builder.no_proxy()),
            NetworkTransport::Socks { host, port } => {
                Proxy::all(format!("socks5h://{}:{}", host, port))
            }
            NetworkTransport::HttpsProxy(url) => Proxy::all(url.as_str()),
        };

        let proxy = proxy.map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Invalid proxy configuration: {}",
                e
            )))
        })?;

        Ok(builder.proxy(proxy))
    }

    /// Build an HTTP client routed through this transport
    pub fn build_client(&self) -> Result<Client> {
        debug!(transport = ?self, "Building backend HTTP client");
        self.apply(Client::builder())?
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
    }
}
