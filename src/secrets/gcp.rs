//! Google Cloud Secret Manager backend.
//!
//! # Responsibilities
//! - Mint an access token from the metadata server (Cloud Run / GCE identity)
//! - Access a secret version over the REST API
//! - Decode the base64 payload to UTF-8
//!
//! Nothing is cached: each lookup fetches a token and the secret again.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::config::{RetryConfig, SecretsConfig};
use crate::observability::{metrics, TraceContext};
use crate::resilience::retries::{is_retryable_status, is_retryable_transport, with_retries};
use crate::secrets::backend::{SecretError, SecretRef, SecretStore};

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Secret store backed by the Secret Manager REST API.
#[derive(Clone)]
pub struct GcpSecretStore {
    client: reqwest::Client,
    project_id: String,
    api_base_url: String,
    metadata_url: String,
    timeout: Duration,
    retries: RetryConfig,
}

impl GcpSecretStore {
    pub fn new(client: reqwest::Client, config: &SecretsConfig, retries: RetryConfig) -> Self {
        Self {
            client,
            project_id: config.project_id.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            metadata_url: config.metadata_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            retries,
        }
    }

    fn access_url(&self, secret: &SecretRef) -> String {
        format!("{}/{}:access", self.api_base_url, secret.resource_name(&self.project_id))
    }

    async fn access_token(&self, secret: &SecretRef) -> Result<String, SecretError> {
        let url = format!("{}/instance/service-accounts/default/token", self.metadata_url);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(secret, "token request failed", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(secret, "metadata server", status));
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| SecretError::unavailable(secret, format!("invalid token response: {}", e)))?;
        Ok(token.access_token)
    }

    async fn access_once(&self, ctx: &TraceContext, secret: &SecretRef) -> Result<String, SecretError> {
        let token = self.access_token(secret).await?;

        tracing::debug!(
            trace = %ctx,
            secret = %secret.resource_name(&self.project_id),
            "Requesting secret"
        );

        let response = self
            .client
            .get(self.access_url(secret))
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(secret, "access request failed", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(secret, "secret manager", status));
        }

        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|e| SecretError::unavailable(secret, format!("invalid access response: {}", e)))?;

        decode_payload(secret, &body.payload.data)
    }
}

#[async_trait]
impl SecretStore for GcpSecretStore {
    async fn get_secret(&self, ctx: &TraceContext, secret: &SecretRef) -> Result<String, SecretError> {
        let result = with_retries(&self.retries, ctx, "secret_access", move || {
            self.access_once(ctx, secret)
        })
        .await;

        metrics::record_upstream("secret_manager", result.is_ok());
        match &result {
            Ok(_) => tracing::debug!(trace = %ctx, secret = %secret, "Secret returned"),
            Err(e) => tracing::error!(trace = %ctx, error = %e, "Failed to access secret version"),
        }
        result
    }
}

fn transport_error(secret: &SecretRef, what: &str, err: &reqwest::Error) -> SecretError {
    let reason = format!("{}: {}", what, err);
    if is_retryable_transport(err) {
        SecretError::transient(secret, reason)
    } else {
        SecretError::unavailable(secret, reason)
    }
}

fn status_error(secret: &SecretRef, upstream: &str, status: reqwest::StatusCode) -> SecretError {
    let reason = format!("{} returned {}", upstream, status);
    if is_retryable_status(status) {
        SecretError::transient(secret, reason)
    } else {
        SecretError::unavailable(secret, reason)
    }
}

/// Decode a Secret Manager payload (standard base64 of UTF-8 bytes).
pub fn decode_payload(secret: &SecretRef, data: &str) -> Result<String, SecretError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| SecretError::unavailable(secret, format!("payload is not base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| SecretError::unavailable(secret, "payload is not UTF-8"))
}
