//! Model configuration report, including the official API balance

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::backend::BackendKind;
use crate::config::RelayConfig;

/// Shown for any value that is unset or could not be fetched
pub const PLACEHOLDER: &str = "-";

pub const DEFAULT_BILLING_BASE_URL: &str = "https://api.openai.com";

/// Snapshot of the relay configuration reported to the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub api_model: BackendKind,
    pub reverse_proxy: String,
    pub timeout_ms: u64,
    pub socks_proxy: String,
    pub https_proxy: String,
    pub balance: String,
}

#[derive(Debug, Deserialize)]
struct CreditGrants {
    #[serde(default)]
    total_available: Option<f64>,
}

/// Build the report. Only the balance touches the network.
pub async fn model_config(config: &RelayConfig, current: BackendKind) -> ModelConfig {
    ModelConfig {
        api_model: current,
        reverse_proxy: config.reverse_proxy().unwrap_or(PLACEHOLDER).to_string(),
        timeout_ms: config.timeout_ms(),
        socks_proxy: config
            .socks_proxy()
            .map(|(host, port)| format!("{}:{}", host, port))
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        https_proxy: config.https_proxy().unwrap_or(PLACEHOLDER).to_string(),
        balance: fetch_balance(config).await,
    }
}

/// Remaining official API credit, formatted to three decimals.
///
/// Returns the placeholder without a request when no API key is configured, and
/// on any transport or parsing failure.
pub async fn fetch_balance(config: &RelayConfig) -> String {
    let Some(api_key) = config.api_key() else {
        return PLACEHOLDER.to_string();
    };
    let base_url = config.api_base_url().unwrap_or(DEFAULT_BILLING_BASE_URL);
    let url = format!("{}/dashboard/billing/credit_grants", base_url);

    let mut builder = reqwest::Client::builder();
    if config.timeout_ms() > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms()));
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to create billing client");
            return PLACEHOLDER.to_string();
        }
    };

    let response = client
        .get(&url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", api_key))
        .send()
        .await
        .and_then(|r| r.error_for_status());

    let grants = match response {
        Ok(response) => response.json::<CreditGrants>().await,
        Err(e) => Err(e),
    };

    match grants {
        Ok(grants) => format!("{:.3}", grants.total_available.unwrap_or(0.0)),
        Err(e) => {
            debug!(url = %url, error = %e, "Balance unavailable");
            PLACEHOLDER.to_string()
        }
    }
}
