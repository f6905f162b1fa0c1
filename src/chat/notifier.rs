//! Webhook delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::observability::{metrics, TraceContext};

/// Body of a chatbot line.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage<'a> {
    pub content: &'a str,
}

/// Errors that can occur while posting to the chat webhook.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook rejected the message with {status}")]
    Rejected { status: StatusCode },
}

/// Delivers a pre-formatted message to a chat webhook.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Post `content` once and return the webhook's response status.
    async fn post_message(
        &self,
        ctx: &TraceContext,
        webhook_url: &str,
        content: &str,
    ) -> Result<StatusCode, ChatError>;
}

/// [`ChatNotifier`] posting JSON over HTTP.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ChatNotifier for WebhookNotifier {
    async fn post_message(
        &self,
        ctx: &TraceContext,
        webhook_url: &str,
        content: &str,
    ) -> Result<StatusCode, ChatError> {
        tracing::debug!(trace = %ctx, "Create HTTP POST request");

        let result = self
            .client
            .post(webhook_url)
            .json(&ChatMessage { content })
            .timeout(self.timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_upstream("chat", false);
                tracing::error!(trace = %ctx, error = %e, "Error with HTTP POST");
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_upstream("chat", status.is_success());
        tracing::info!(trace = %ctx, status = %status, "Response");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier() -> WebhookNotifier {
        WebhookNotifier::new(reqwest::Client::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn posts_content_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/integrations/abc/buckets/1/chats/2/lines"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({ "content": "Test" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/integrations/abc/buckets/1/chats/2/lines", server.uri());
        let status = notifier()
            .post_message(&TraceContext::new("t"), &url, "Test")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let status = notifier()
            .post_message(&TraceContext::new("t"), &server.uri(), "Test")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unreachable_webhook_is_transport_error() {
        let err = notifier()
            .post_message(&TraceContext::new("t"), "http://127.0.0.1:1/lines", "Test")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
    }
}
