//! Mailing-list statistics subsystem.
//!
//! # Data Flow
//! ```text
//! API key (from the secret store) + list id [+ segment id]
//!     → client.rs (data-center URL, basic auth, GET)
//!     → types.rs (decode list / segment document)
//!     → member count
//! ```
//!
//! # Design Decisions
//! - Counts are read fresh on every request; no pagination is involved
//! - Failures are returned to the caller, never fatal

pub mod client;
pub mod types;

pub use client::{data_center_url, ListStatsReader, MailchimpClient, MailchimpError};
