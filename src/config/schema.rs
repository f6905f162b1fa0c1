//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files, and
//! every section defaults to the values of the current deployment.

use serde::{Deserialize, Serialize};

/// Root configuration for the stats relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Server read/write/idle timeouts.
    pub timeouts: TimeoutConfig,

    /// Deployment identity used for trace formatting.
    pub service: ServiceConfig,

    /// Secret backend settings and secret names.
    pub secrets: SecretsConfig,

    /// Mailing-list provider settings.
    pub mailchimp: MailchimpConfig,

    /// Summary content.
    pub report: ReportConfig,

    /// Chat webhook delivery settings.
    pub chat: ChatConfig,

    /// Retry configuration for idempotent upstream reads.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Socket address string the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// Listen port. `PORT` in the environment takes precedence.
    pub port: u16,

    /// Maximum concurrently served connections (backpressure).
    pub max_connections: usize,

    /// Maximum size of the request head in bytes.
    pub max_header_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1_000,
            max_header_bytes: 1 << 20,
        }
    }
}

/// Timeout configuration for served connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for reading a request's head and body, in seconds.
    pub read_secs: u64,

    /// Deadline for producing a response, in seconds.
    pub write_secs: u64,

    /// Keep-alive connections with no request in flight are closed after this many seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 10,
            write_secs: 10,
            idle_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (`K_SERVICE` on Cloud Run).
    pub name: String,
}

/// Which secret backend resolves secret references.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackendKind {
    /// Google Cloud Secret Manager.
    #[default]
    Gcp,
    /// Process environment, for local runs.
    Env,
}

/// Secret backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub backend: SecretBackendKind,

    /// Cloud project owning the secrets.
    pub project_id: String,

    /// Secret Manager REST endpoint.
    pub api_base_url: String,

    /// Metadata server used to mint access tokens.
    pub metadata_url: String,

    /// Name of the secret holding the Mailchimp API key.
    pub mailchimp_api_key: String,

    /// Name of the secret holding the chat webhook URL.
    pub chat_webhook_url: String,

    /// Secret version, a number or an alias such as `latest`.
    pub version: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackendKind::Gcp,
            project_id: "bc-totorobot-go".to_string(),
            api_base_url: "https://secretmanager.googleapis.com/v1".to_string(),
            metadata_url: "http://metadata.google.internal/computeMetadata/v1".to_string(),
            mailchimp_api_key: "mailchimp-api-key".to_string(),
            chat_webhook_url: "basecamp-chatbot-url".to_string(),
            version: "latest".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Mailing-list provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailchimpConfig {
    /// Audience (list) to report on.
    pub list_id: String,

    /// Overrides the data-center URL derived from the API key.
    pub api_base_url: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MailchimpConfig {
    fn default() -> Self {
        Self {
            list_id: "267911a165".to_string(),
            api_base_url: None,
            timeout_secs: 5,
        }
    }
}

/// A list segment included in the summary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SegmentConfig {
    pub id: String,
    pub label: String,
}

/// Summary content configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Heading of the chat message.
    pub title: String,

    /// Segments reported before the list total, in order.
    pub segments: Vec<SegmentConfig>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Mailchimp Stats".to_string(),
            segments: vec![
                SegmentConfig {
                    id: "3577267".to_string(),
                    label: "Confirmed subscribers".to_string(),
                },
                SegmentConfig {
                    id: "3577271".to_string(),
                    label: "Unconfirmed members".to_string(),
                },
            ],
        }
    }
}

/// Chat webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Fail the request when the webhook answers with a non-2xx status.
    pub require_success: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            require_success: true,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            json: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
