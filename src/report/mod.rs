//! Stats reporting subsystem.
//!
//! # Data Flow
//! ```text
//! TraceContext
//!     → pipeline.rs: API key secret
//!     → pipeline.rs: list total, then each configured segment
//!     → format.rs: HTML summary
//!     → pipeline.rs: webhook URL secret, chat post
//!     → StatsReport | ReportError
//! ```
//!
//! # Design Decisions
//! - Strictly sequential; the first failure short-circuits the run
//! - Errors are values carried back to the HTTP layer

pub mod format;
pub mod pipeline;

pub use format::{group_thousands, render_summary, SegmentCount};
pub use pipeline::{ReportError, ReportSettings, StatsReport, StatsReporter};
