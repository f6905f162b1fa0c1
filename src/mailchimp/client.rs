//! Mailchimp Marketing API client.
//!
//! # Responsibilities
//! - Derive the data-center endpoint from the API key
//! - Read list and segment member counts
//! - Turn problem documents and transport failures into `MailchimpError`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{MailchimpConfig, RetryConfig};
use crate::mailchimp::types::{ListInfo, Problem, Segment};
use crate::observability::{metrics, TraceContext};
use crate::resilience::retries::{is_retryable_status, is_retryable_transport, with_retries};
use crate::resilience::Retryable;

/// Errors that can occur while reading list statistics.
#[derive(Debug, Error)]
pub enum MailchimpError {
    /// Key lacks the `-<dc>` suffix and no base URL is configured.
    #[error("API key has no data-center suffix")]
    InvalidApiKey,

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned {status}: {title} {detail}")]
    Api {
        path: String,
        status: StatusCode,
        title: String,
        detail: String,
    },

    #[error("unexpected response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Retryable for MailchimpError {
    fn is_retryable(&self) -> bool {
        match self {
            MailchimpError::Transport { source, .. } => is_retryable_transport(source),
            MailchimpError::Api { status, .. } => is_retryable_status(*status),
            MailchimpError::InvalidApiKey | MailchimpError::Decode { .. } => false,
        }
    }
}

/// Reads member counts from the mailing-list provider.
#[async_trait]
pub trait ListStatsReader: Send + Sync {
    /// Total member count of a list.
    async fn list_member_count(
        &self,
        ctx: &TraceContext,
        api_key: &str,
        list_id: &str,
    ) -> Result<u64, MailchimpError>;

    /// Member count of one segment of a list.
    async fn segment_member_count(
        &self,
        ctx: &TraceContext,
        api_key: &str,
        list_id: &str,
        segment_id: &str,
    ) -> Result<u64, MailchimpError>;
}

/// Base URL for the data center encoded in `api_key` (`<key>-us7`).
pub fn data_center_url(api_key: &str) -> Option<String> {
    let (_, dc) = api_key.trim().rsplit_once('-')?;
    if dc.is_empty() || !dc.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!("https://{}.api.mailchimp.com/3.0", dc))
}

/// HTTP implementation of [`ListStatsReader`].
#[derive(Clone)]
pub struct MailchimpClient {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
    retries: RetryConfig,
}

impl MailchimpClient {
    pub fn new(client: reqwest::Client, config: &MailchimpConfig, retries: RetryConfig) -> Self {
        Self {
            client,
            base_url: config
                .api_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            timeout: Duration::from_secs(config.timeout_secs),
            retries,
        }
    }

    fn base_url(&self, api_key: &str) -> Result<String, MailchimpError> {
        match &self.base_url {
            Some(base) => Ok(base.clone()),
            None => data_center_url(api_key).ok_or(MailchimpError::InvalidApiKey),
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        path: &str,
        api_key: &str,
    ) -> Result<T, MailchimpError> {
        let response = self
            .client
            .get(url)
            .basic_auth("stats-relay", Some(api_key))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| MailchimpError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let problem = response.json::<Problem>().await.unwrap_or_default();
            return Err(MailchimpError::Api {
                path: path.to_string(),
                status,
                title: problem.title,
                detail: problem.detail,
            });
        }

        response.json().await.map_err(|source| MailchimpError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &TraceContext,
        api_key: &str,
        path: &str,
    ) -> Result<T, MailchimpError> {
        let url = format!("{}{}", self.base_url(api_key)?, path);
        let url = url.as_str();

        let result = with_retries(&self.retries, ctx, "mailchimp_get", move || {
            self.get_once(url, path, api_key)
        })
        .await;

        metrics::record_upstream("mailchimp", result.is_ok());
        result
    }
}

#[async_trait]
impl ListStatsReader for MailchimpClient {
    async fn list_member_count(
        &self,
        ctx: &TraceContext,
        api_key: &str,
        list_id: &str,
    ) -> Result<u64, MailchimpError> {
        tracing::info!(trace = %ctx, list_id, "Get list");
        let list: ListInfo = self
            .get_json(ctx, api_key, &format!("/lists/{}", list_id))
            .await?;
        tracing::info!(trace = %ctx, list = %list.name, member_count = list.stats.member_count, "Member count");
        Ok(list.stats.member_count)
    }

    async fn segment_member_count(
        &self,
        ctx: &TraceContext,
        api_key: &str,
        list_id: &str,
        segment_id: &str,
    ) -> Result<u64, MailchimpError> {
        tracing::debug!(trace = %ctx, list_id, segment_id, "Get segment");
        let segment: Segment = self
            .get_json(ctx, api_key, &format!("/lists/{}/segments/{}", list_id, segment_id))
            .await?;
        tracing::info!(trace = %ctx, segment = %segment.name, member_count = segment.member_count, "Member count");
        Ok(segment.member_count)
    }
}
