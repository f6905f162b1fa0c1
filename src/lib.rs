//! Mailchimp stats relay library.

pub mod chat;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mailchimp;
pub mod net;
pub mod observability;
pub mod report;
pub mod resilience;
pub mod secrets;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use report::StatsReporter;
