//! Configuration loading: server settings and relay credentials

pub mod relay;
pub mod settings;

pub use relay::{RelayConfig, DEFAULT_TIMEOUT_MS};
pub use settings::{LoggingConfig, ServerConfig, Settings};
