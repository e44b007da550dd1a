//! Configuration report and balance lookup against a mocked billing endpoint

use chat_relay::backend::BackendKind;
use chat_relay::config::RelayConfig;
use chat_relay::relay::{reporter, Relay, PLACEHOLDER};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn keyed_config(server: &MockServer) -> RelayConfig {
    RelayConfig {
        openai_api_key: Some("sk-test".to_string()),
        openai_api_base_url: Some(server.uri()),
        ..Default::default()
    }
}

async fn mount_billing(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/dashboard/billing/credit_grants"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_balance_formatted_to_three_decimals() {
    let server = MockServer::start().await;
    mount_billing(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "object": "credit_summary",
            "total_granted": 18.0,
            "total_used": 5.6544,
            "total_available": 12.3456
        })),
    )
    .await;

    let balance = reporter::fetch_balance(&keyed_config(&server)).await;
    assert_eq!(balance, "12.346");
}

#[tokio::test]
async fn test_missing_total_reports_zero() {
    let server = MockServer::start().await;
    mount_billing(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;

    let balance = reporter::fetch_balance(&keyed_config(&server)).await;
    assert_eq!(balance, "0.000");
}

#[tokio::test]
async fn test_upstream_error_reports_placeholder() {
    let server = MockServer::start().await;
    mount_billing(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

    let balance = reporter::fetch_balance(&keyed_config(&server)).await;
    assert_eq!(balance, PLACEHOLDER);
}

#[tokio::test]
async fn test_malformed_body_reports_placeholder() {
    let server = MockServer::start().await;
    mount_billing(&server, ResponseTemplate::new(200).set_body_string("not json")).await;

    let balance = reporter::fetch_balance(&keyed_config(&server)).await;
    assert_eq!(balance, PLACEHOLDER);
}

#[tokio::test]
async fn test_no_key_skips_billing_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total_available": 1.0 })))
        .expect(0)
        .mount(&server)
        .await;

    let config = RelayConfig {
        openai_access_token: Some("token".to_string()),
        openai_api_base_url: Some(server.uri()),
        ..Default::default()
    };

    assert_eq!(reporter::fetch_balance(&config).await, PLACEHOLDER);
}

#[tokio::test]
async fn test_relay_report_tracks_current_backend() {
    let server = MockServer::start().await;
    mount_billing(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "total_available": 4.5 })),
    )
    .await;

    let relay = Relay::new(RelayConfig {
        openai_access_token: Some("token".to_string()),
        https_proxy: Some("http://proxy.local:8080".to_string()),
        timeout_ms: Some("60000".to_string()),
        ..keyed_config(&server)
    });

    let report = relay.config().await;
    assert_eq!(report.api_model, BackendKind::ChatGptUnofficialProxyApi);
    assert_eq!(report.timeout_ms, 60_000);
    assert_eq!(report.https_proxy, "http://proxy.local:8080");
    assert_eq!(report.socks_proxy, PLACEHOLDER);
    assert_eq!(report.reverse_proxy, PLACEHOLDER);
    assert_eq!(report.balance, "4.500");

    relay.selector().select(Some("ChatGPTAPI")).unwrap();
    let report = relay.config().await;
    assert_eq!(report.api_model, BackendKind::ChatGptApi);
}
