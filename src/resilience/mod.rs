//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Idempotent upstream read (secret access, list stats):
//!     → per-call timeout on the HTTP client
//!     → On failure: retries.rs (check if retryable, retry with backoff.rs delay)
//!     → Final error returned to the pipeline, never panics
//! ```

pub mod backoff;
pub mod retries;

pub use retries::{with_retries, Retryable};
