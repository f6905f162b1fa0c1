//! Secret store abstraction and error types.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::observability::TraceContext;
use crate::resilience::Retryable;

/// A named secret at a specific version (`latest` or a version number).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef {
    pub name: String,
    pub version: String,
}

impl SecretRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, "latest")
    }

    /// Full Secret Manager resource name under `project`.
    pub fn resource_name(&self, project: &str) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            project, self.name, self.version
        )
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/versions/{}", self.name, self.version)
    }
}

/// Errors that can occur while resolving a secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Backend unreachable, secret or version missing, or payload unusable.
    #[error("secret {secret} unavailable: {reason}")]
    Unavailable {
        secret: String,
        reason: String,
        transient: bool,
    },
}

impl SecretError {
    pub fn unavailable(secret: &SecretRef, reason: impl Into<String>) -> Self {
        SecretError::Unavailable {
            secret: secret.to_string(),
            reason: reason.into(),
            transient: false,
        }
    }

    pub fn transient(secret: &SecretRef, reason: impl Into<String>) -> Self {
        SecretError::Unavailable {
            secret: secret.to_string(),
            reason: reason.into(),
            transient: true,
        }
    }
}

impl Retryable for SecretError {
    fn is_retryable(&self) -> bool {
        match self {
            SecretError::Unavailable { transient, .. } => *transient,
        }
    }
}

/// Resolves secret references to their plaintext values.
///
/// Implementations must not cache: every call reads the backend.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, ctx: &TraceContext, secret: &SecretRef) -> Result<String, SecretError>;
}

/// In-process secret store keyed by secret name (version is ignored).
#[derive(Debug, Default, Clone)]
pub struct MemorySecretStore {
    secrets: HashMap<String, String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, ctx: &TraceContext, secret: &SecretRef) -> Result<String, SecretError> {
        tracing::debug!(trace = %ctx, secret = %secret, "Reading in-memory secret");
        self.secrets
            .get(&secret.name)
            .cloned()
            .ok_or_else(|| SecretError::unavailable(secret, "not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_name_format() {
        let secret = SecretRef::latest("mailchimp-api-key");
        assert_eq!(
            secret.resource_name("bc-totorobot-go"),
            "projects/bc-totorobot-go/secrets/mailchimp-api-key/versions/latest"
        );
        assert_eq!(secret.to_string(), "mailchimp-api-key/versions/latest");
    }

    #[tokio::test]
    async fn memory_store_hits_and_misses() {
        let store = MemorySecretStore::new().with_secret("a", "1");
        let ctx = TraceContext::new("t");

        assert_eq!(store.get_secret(&ctx, &SecretRef::latest("a")).await.unwrap(), "1");

        let err = store.get_secret(&ctx, &SecretRef::new("b", "3")).await.unwrap_err();
        assert_eq!(err.to_string(), "secret b/versions/3 unavailable: not found");
        assert!(!err.is_retryable());
    }
}
