//! End-to-end tests for `/getMailchimpStats` over real TCP.

mod common;

use std::time::Duration;

use common::*;
use futures_util::future::join_all;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_chat(server: &MockServer, status: u16, expected_posts: u64) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected_posts)
        .mount(server)
        .await;
}

#[tokio::test]
async fn stats_are_posted_once_with_every_count() {
    let upstream = MockServer::start().await;
    mount_secrets(&upstream).await;
    mount_counts(&upstream, 500, 200, 300).await;
    mount_chat(&upstream, 201, 1).await;

    let relay = spawn_relay(relay_config(&upstream)).await;
    let response = reqwest::get(relay.url("/getMailchimpStats")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-correlation-id"));
    assert_eq!(response.text().await.unwrap(), "OK");

    let posts = chat_posts(&upstream).await;
    assert_eq!(posts.len(), 1);
    let content = &posts[0];
    assert!(content.starts_with("<strong>Mailchimp Stats</strong>"));
    assert!(content.contains("<li><strong>Confirmed subscribers:</strong> 200</li>"));
    assert!(content.contains("<li><strong>Unconfirmed members:</strong> 300</li>"));
    assert!(content.contains("<li><strong>Total list members:</strong> 500</li>"));
}

#[tokio::test]
async fn secret_failure_is_503_and_server_stays_up() {
    let upstream = MockServer::start().await;
    mount_token(&upstream).await;
    Mock::given(method("GET"))
        .and(path(secret_path("mailchimp-api-key")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&upstream)
        .await;
    mount_chat(&upstream, 201, 0).await;

    let relay = spawn_relay(relay_config(&upstream)).await;

    let response = reqwest::get(relay.url("/getMailchimpStats")).await.unwrap();
    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.unwrap(), "503 - Service Unavailable");

    let response = reqwest::get(relay.url("/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "indexHandler");
}

#[tokio::test]
async fn mailchimp_error_is_502_without_chat_post() {
    let upstream = MockServer::start().await;
    mount_secrets(&upstream).await;
    Mock::given(method("GET"))
        .and(path(format!("/3.0/lists/{}", LIST_ID)))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "title": "Internal Server Error",
            "detail": "try again"
        })))
        .expect(3)
        .mount(&upstream)
        .await;
    mount_chat(&upstream, 201, 0).await;

    let relay = spawn_relay(relay_config(&upstream)).await;
    let response = reqwest::get(relay.url("/getMailchimpStats")).await.unwrap();

    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "502 - Bad Gateway");
}

#[tokio::test]
async fn slow_mailchimp_is_504_with_correlation() {
    let upstream = MockServer::start().await;
    mount_secrets(&upstream).await;
    Mock::given(method("GET"))
        .and(path(format!("/3.0/lists/{}", LIST_ID)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "stats": { "member_count": 1 } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstream)
        .await;
    mount_chat(&upstream, 201, 0).await;

    let mut config = relay_config(&upstream);
    config.timeouts.write_secs = 1;
    let relay = spawn_relay(config).await;

    let response = reqwest::Client::new()
        .get(relay.url("/getMailchimpStats"))
        .header("X-Cloud-Trace-Context", "slowtrace/1;o=1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
    assert_eq!(
        response.headers()["x-correlation-id"],
        format!("projects/{}/traces/slowtrace", SERVICE_NAME).as_str()
    );
    assert_eq!(response.text().await.unwrap(), "504 - Gateway Timeout");
}

#[tokio::test]
async fn rejected_chat_post_is_502_and_not_retried() {
    let upstream = MockServer::start().await;
    mount_secrets(&upstream).await;
    mount_counts(&upstream, 10, 7, 3).await;
    mount_chat(&upstream, 500, 1).await;

    let relay = spawn_relay(relay_config(&upstream)).await;
    let response = reqwest::get(relay.url("/getMailchimpStats")).await.unwrap();

    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_correlation() {
    let upstream = MockServer::start().await;
    mount_secrets(&upstream).await;
    mount_counts(&upstream, 500, 200, 300).await;
    mount_chat(&upstream, 201, 8).await;

    let relay = spawn_relay(relay_config(&upstream)).await;
    let client = reqwest::Client::new();

    let requests = (0..8).map(|i| {
        let client = client.clone();
        let url = relay.url("/getMailchimpStats");
        async move {
            let response = client
                .get(url)
                .header("X-Cloud-Trace-Context", format!("trace{}/1;o=1", i))
                .send()
                .await
                .unwrap();
            (i, response)
        }
    });

    for (i, response) in join_all(requests).await {
        assert_eq!(response.status(), 200);
        let correlation = response.headers()["x-correlation-id"].to_str().unwrap();
        assert_eq!(
            correlation,
            format!("projects/{}/traces/trace{}", SERVICE_NAME, i)
        );
    }
    assert_eq!(chat_posts(&upstream).await.len(), 8);
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let upstream = MockServer::start().await;
    let relay = spawn_relay(relay_config(&upstream)).await;

    let response = reqwest::get(relay.url("/")).await.unwrap();
    assert_eq!(response.status(), 200);

    relay.shutdown.trigger();
    let finished = tokio::time::timeout(Duration::from_secs(15), relay.handle).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}
