//! Secret resolution subsystem.
//!
//! # Data Flow
//! ```text
//! SecretRef (name + version)
//!     → SecretStore (gcp.rs in production, env.rs locally)
//!     → plaintext value, used once by the caller and dropped
//! ```
//!
//! # Design Decisions
//! - No caching; every lookup reads the backend
//! - Every failure maps to `SecretError::Unavailable`

pub mod backend;
pub mod env;
pub mod gcp;

use std::sync::Arc;

pub use backend::{MemorySecretStore, SecretError, SecretRef, SecretStore};
pub use env::EnvSecretStore;
pub use gcp::GcpSecretStore;

use crate::config::{RetryConfig, SecretBackendKind, SecretsConfig};

/// Build the configured secret backend.
pub fn from_config(
    client: reqwest::Client,
    config: &SecretsConfig,
    retries: &RetryConfig,
) -> Arc<dyn SecretStore> {
    match config.backend {
        SecretBackendKind::Gcp => Arc::new(GcpSecretStore::new(client, config, retries.clone())),
        SecretBackendKind::Env => Arc::new(EnvSecretStore::new()),
    }
}
