//! Shared helpers for the WireMock integration tests.

#![allow(dead_code)]

use std::time::Duration;

use moonshot_digest::{ClientConfig, MoonshotClient, RetryConfig};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "sk-integration-key";

/// Configuration pointing at the mock server, with millisecond timings.
pub fn fast_config(server: &MockServer) -> ClientConfig {
    fast_config_at(&server.uri())
}

/// Millisecond-timing configuration for an arbitrary base URL.
pub fn fast_config_at(base_url: &str) -> ClientConfig {
    let quick = |attempts| RetryConfig::new(attempts, Duration::from_millis(5));

    ClientConfig::builder()
        .base_url(base_url)
        .timeout(Duration::from_secs(5))
        .settle_delay(Duration::from_millis(5))
        .upload_retry(quick(3))
        .poll_retry(quick(10))
        .analyze_retry(quick(3))
        .build()
        .unwrap()
}

pub fn client(server: &MockServer) -> MoonshotClient {
    MoonshotClient::builder()
        .api_key(API_KEY)
        .config(fast_config(server))
        .build()
        .unwrap()
}

/// Mock requiring the bearer token.
pub fn authed(method_name: &str, route: &str) -> wiremock::MockBuilder {
    Mock::given(method(method_name))
        .and(path(route))
        .and(header("Authorization", format!("Bearer {API_KEY}").as_str()))
}

pub fn completion(reply: &str) -> Value {
    json!({
        "id": "chatcmpl-integration",
        "object": "chat.completion",
        "model": "moonshot-v1-32k",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }]
    })
}

pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"message": message, "type": "invalid_request_error"}
    }))
}

pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
