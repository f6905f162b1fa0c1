//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (net::connection)
//!     → server.rs (router, request id, tracing, timeouts)
//!     → handlers.rs (index, stats, not found)
//!     → response.rs (status bodies, correlation header)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
