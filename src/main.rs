//! Main entry point for the Chat Relay

use chat_relay::{
    api,
    config::{RelayConfig, Settings},
    relay::Relay,
    AppState,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.logging.format.as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        "compact" => registry.with(fmt::layer().compact()).init(),
        _ => registry.with(fmt::layer().pretty()).init(),
    }

    info!("Starting Chat Relay");

    // Refuse to start without any credential
    let relay_config = RelayConfig::from_env()?;
    relay_config.validate()?;

    info!(
        timeout_ms = relay_config.timeout_ms(),
        official_api = relay_config.api_key().is_some(),
        access_token = relay_config.access_token().is_some(),
        web_chat = relay_config.bing_cookie().is_some(),
        "Loaded relay configuration"
    );

    let relay = Relay::new(relay_config);
    let addr = settings.bind_address();
    let app_state = Arc::new(AppState::new(settings, relay));

    // Build the router
    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
