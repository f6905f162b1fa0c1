//! Environment-variable secret backend for local runs.

use async_trait::async_trait;

use crate::observability::TraceContext;
use crate::secrets::backend::{SecretError, SecretRef, SecretStore};

/// Reads `mailchimp-api-key` from `MAILCHIMP_API_KEY`, and so on.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }
}

/// Environment variable name for a secret name.
pub fn env_var_name(secret_name: &str) -> String {
    secret_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, ctx: &TraceContext, secret: &SecretRef) -> Result<String, SecretError> {
        let var = env_var_name(&secret.name);
        tracing::debug!(trace = %ctx, secret = %secret, var = %var, "Reading secret from environment");
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(SecretError::unavailable(secret, format!("{} is not set", var))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_upper_snake() {
        assert_eq!(env_var_name("mailchimp-api-key"), "MAILCHIMP_API_KEY");
        assert_eq!(env_var_name("basecamp-chatbot-url"), "BASECAMP_CHATBOT_URL");
        assert_eq!(env_var_name("a.b/c"), "A_B_C");
    }

    #[tokio::test]
    async fn unset_variable_is_unavailable() {
        let err = EnvSecretStore::new()
            .get_secret(
                &TraceContext::new("t"),
                &SecretRef::latest("stats-relay-test-surely-unset"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("STATS_RELAY_TEST_SURELY_UNSET is not set"));
    }
}
