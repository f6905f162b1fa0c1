//! Shared utilities for integration tests.
//!
//! A single wiremock server plays the metadata server, Secret Manager,
//! the Mailchimp API and the chat webhook.

#![allow(dead_code)]

use std::net::SocketAddr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use stats_relay::config::{RelayConfig, RetryConfig};
use stats_relay::lifecycle::startup::{serve, StartupError};
use stats_relay::net::Listener;
use stats_relay::Shutdown;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SERVICE_NAME: &str = "stats-relay-test";
pub const PROJECT: &str = "proj";
pub const LIST_ID: &str = "267911a165";
pub const CONFIRMED_SEGMENT: &str = "3577267";
pub const UNCONFIRMED_SEGMENT: &str = "3577271";
pub const CHAT_PATH: &str = "/chat/lines";

/// Config pointing every upstream at `upstream`.
pub fn relay_config(upstream: &MockServer) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.service.name = SERVICE_NAME.into();
    config.secrets.project_id = PROJECT.into();
    config.secrets.api_base_url = format!("{}/v1", upstream.uri());
    config.secrets.metadata_url = format!("{}/computeMetadata/v1", upstream.uri());
    config.mailchimp.api_base_url = Some(format!("{}/3.0", upstream.uri()));
    config.retries = RetryConfig {
        base_delay_ms: 1,
        max_delay_ms: 5,
        ..RetryConfig::default()
    };
    config
}

/// A relay serving on an ephemeral port.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), StartupError>>,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn spawn_relay(config: RelayConfig) -> RunningRelay {
    let listener = Listener::bind("127.0.0.1:0", config.listener.max_connections)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(serve(config, listener, shutdown.subscribe()));
    RunningRelay {
        addr,
        shutdown,
        handle,
    }
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

pub fn secret_path(name: &str) -> String {
    format!("/v1/projects/{}/secrets/{}/versions/latest:access", PROJECT, name)
}

pub async fn mount_secret(server: &MockServer, name: &str, value: &str) {
    Mock::given(method("GET"))
        .and(path(secret_path(name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": format!("projects/1/secrets/{}/versions/1", name),
            "payload": { "data": STANDARD.encode(value) }
        })))
        .mount(server)
        .await;
}

/// Both secrets, with the webhook pointing back at `server`.
pub async fn mount_secrets(server: &MockServer) {
    mount_token(server).await;
    mount_secret(server, "mailchimp-api-key", "key-us7").await;
    mount_secret(server, "basecamp-chatbot-url", &format!("{}{}", server.uri(), CHAT_PATH)).await;
}

pub async fn mount_counts(server: &MockServer, total: u64, confirmed: u64, unconfirmed: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/3.0/lists/{}", LIST_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": LIST_ID,
            "name": "Newsletter",
            "stats": { "member_count": total, "unsubscribe_count": 4 }
        })))
        .mount(server)
        .await;

    for (segment, count) in [(CONFIRMED_SEGMENT, confirmed), (UNCONFIRMED_SEGMENT, unconfirmed)] {
        Mock::given(method("GET"))
            .and(path(format!("/3.0/lists/{}/segments/{}", LIST_ID, segment)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": segment.parse::<u64>().unwrap(),
                "name": "segment",
                "member_count": count
            })))
            .mount(server)
            .await;
    }
}

/// Bodies of every chat webhook POST the upstream received.
pub async fn chat_posts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == CHAT_PATH)
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["content"].as_str().unwrap().to_string()
        })
        .collect()
}
