//! Unit tests for configuration module

use chat_relay::config::{RelayConfig, Settings, DEFAULT_TIMEOUT_MS};
use chat_relay::AppError;
use std::io::Write;

#[test]
fn test_default_settings() {
    let settings = Settings::default();

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 3002);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.logging.format, "json");
}

#[test]
fn test_settings_missing_file_uses_defaults() {
    let settings = Settings::load_from_path("does/not/exist.yaml").unwrap();
    assert_eq!(settings.server.port, 3002);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "server:\n  host: 127.0.0.1\n  port: 9000\nlogging:\n  level: debug\n  format: compact"
    )
    .unwrap();

    let settings = Settings::load_from_path(file.path()).unwrap();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 9000);
    assert_eq!(settings.logging.level, "debug");
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_validation_invalid_port() {
    let mut settings = Settings::default();
    settings.server.port = 0;

    assert!(settings.validate().is_err());
}

#[test]
fn test_startup_requires_a_credential() {
    let config = RelayConfig::default();
    assert!(matches!(config.validate(), Err(AppError::MissingCredential(_))));
}

#[test]
fn test_startup_with_either_credential() {
    let with_key = RelayConfig {
        openai_api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    assert!(with_key.validate().is_ok());

    let with_token = RelayConfig {
        openai_access_token: Some("token".to_string()),
        ..Default::default()
    };
    assert!(with_token.validate().is_ok());
}

#[test]
fn test_relay_config_deserializes_env_keys() {
    let config: RelayConfig = serde_json::from_value(serde_json::json!({
        "openai_api_key": "sk-test",
        "socks_proxy_host": "127.0.0.1",
        "socks_proxy_port": "7890",
        "timeout_ms": "not-a-number",
    }))
    .unwrap();

    assert_eq!(config.api_key(), Some("sk-test"));
    assert_eq!(config.socks_proxy(), Some(("127.0.0.1", "7890")));
    assert_eq!(config.timeout_ms(), DEFAULT_TIMEOUT_MS);
    assert!(config.access_token().is_none());
}
