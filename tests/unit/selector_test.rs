//! Unit tests for backend selection

use chat_relay::backend::official::{LARGE_CONTEXT_BUDGET, LARGE_MODEL_BUDGET};
use chat_relay::backend::{BackendKind, ConversationStore, NetworkTransport};
use chat_relay::config::RelayConfig;
use chat_relay::relay::selector::{official_options, reverse_proxy_options, Selector};
use chat_relay::relay::{ChatRequest, ChatResult, CurrentBackend, Relay};
use std::sync::Arc;

fn all_credentials() -> RelayConfig {
    RelayConfig {
        openai_api_key: Some("sk-test".to_string()),
        openai_access_token: Some("token".to_string()),
        bing_cookie: Some("cookie".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_each_engine_selects_one_kind() {
    let current = CurrentBackend::default();
    let selector = Selector::new(Arc::new(all_credentials()), current.clone(), ConversationStore::new());

    let cases = [
        (Some("ChatGPTAPI"), BackendKind::ChatGptApi),
        (Some("ChatGPTUnofficialProxyAPI"), BackendKind::ChatGptUnofficialProxyApi),
        (Some("BingChat"), BackendKind::BingChat),
        (None, BackendKind::ChatGptUnofficialProxyApi),
    ];

    for (engine, expected) in cases {
        let (backend, kind) = selector.select(engine).unwrap();
        assert_eq!(kind, expected);
        assert_eq!(backend.kind(), expected);
        assert_eq!(current.get(), expected);
    }
}

#[test]
fn test_official_without_key_uses_reverse_proxy() {
    let config = RelayConfig {
        openai_api_key: None,
        ..all_credentials()
    };
    let selector = Selector::new(Arc::new(config), CurrentBackend::default(), ConversationStore::new());

    let (_, kind) = selector.select(Some("ChatGPTAPI")).unwrap();
    assert_eq!(kind, BackendKind::ChatGptUnofficialProxyApi);
}

#[test]
fn test_token_budget_presets() {
    let mut config = all_credentials();

    config.openai_api_model = Some("gpt-4-32k".to_string());
    assert_eq!(official_options(&config).unwrap().budget, Some(LARGE_CONTEXT_BUDGET));

    config.openai_api_model = Some("gpt-4-0613".to_string());
    assert_eq!(official_options(&config).unwrap().budget, Some(LARGE_MODEL_BUDGET));

    config.openai_api_model = Some("gpt-3.5-turbo".to_string());
    assert_eq!(official_options(&config).unwrap().budget, None);
}

#[test]
fn test_socks_installed_instead_of_https() {
    let config = RelayConfig {
        socks_proxy_host: Some("127.0.0.1".to_string()),
        socks_proxy_port: Some("1080".to_string()),
        https_proxy: Some("http://127.0.0.1:8080".to_string()),
        ..all_credentials()
    };

    let expected = NetworkTransport::Socks {
        host: "127.0.0.1".to_string(),
        port: "1080".to_string(),
    };
    assert_eq!(official_options(&config).unwrap().transport, expected);
    assert_eq!(reverse_proxy_options(&config).unwrap().transport, expected);
}

#[tokio::test]
async fn test_selection_failure_is_a_fail_result() {
    let config = RelayConfig {
        openai_api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    let relay = Relay::new(config);

    let request = ChatRequest {
        engine: Some("BingChat".to_string()),
        ..ChatRequest::new("hello")
    };
    let result = relay.forward(request, None).await;

    assert!(matches!(result, ChatResult::Fail { .. }));
    assert_eq!(relay.current_backend(), BackendKind::ChatGptUnofficialProxyApi);
}
