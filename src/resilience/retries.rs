//! Retry logic.
//!
//! # Responsibilities
//! - Classify upstream errors as transient or permanent
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only idempotent reads go through here; the chat POST never does
//! - Transport errors, timeouts, 429 and 5xx are retryable

use std::fmt::Display;
use std::future::Future;

use reqwest::StatusCode;

use crate::config::RetryConfig;
use crate::observability::TraceContext;
use crate::resilience::backoff::backoff_for;

/// Errors that know whether repeating the call could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Whether an upstream HTTP status is worth retrying.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Whether a reqwest failure is worth retrying.
pub fn is_retryable_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retries<T, E, F, Fut>(
    config: &RetryConfig,
    ctx: &TraceContext,
    operation: &'static str,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = if config.enabled { config.max_attempts.max(1) } else { 1 };
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                let delay = backoff_for(config, attempt);
                tracing::warn!(
                    trace = %ctx,
                    operation,
                    attempt,
                    delay = ?delay,
                    error = %err,
                    "Retrying upstream call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
