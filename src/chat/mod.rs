//! Chat webhook subsystem.
//!
//! # Data Flow
//! ```text
//! formatted summary + webhook URL (from the secret store)
//!     → notifier.rs (single POST of {"content": ...})
//!     → response status, logged and checked by the caller
//! ```
//!
//! # Design Decisions
//! - Exactly one attempt; a POST is never retried
//! - Whether a non-2xx status fails the request is the caller's policy

pub mod notifier;

pub use notifier::{ChatError, ChatMessage, ChatNotifier, WebhookNotifier};
