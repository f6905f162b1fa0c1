//! Per-request correlation.
//!
//! # Responsibilities
//! - Extract the Cloud Trace id from incoming requests
//! - Fall back to the request id when no trace header is present
//! - Create the span every request is handled in
//!
//! # Design Decisions
//! - The context is a plain value handed down the call chain; nothing is
//!   stored process-wide, so concurrent requests cannot overwrite each other

use std::fmt;

use axum::http::HeaderMap;

/// Header set by Google front ends: `TRACE_ID/SPAN_ID;o=TRACE_TRUE`.
pub const CLOUD_TRACE_HEADER: &str = "x-cloud-trace-context";

/// Request id header (set by the request-id layer when the client omits it).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Response header echoing the correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation value for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    correlation_id: String,
}

impl TraceContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }

    /// Derive the context from request headers.
    ///
    /// Prefers the Cloud Trace id (formatted for Cloud Logging), then the
    /// request id, then a fresh UUID.
    pub fn from_headers(headers: &HeaderMap, service_name: &str) -> Self {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(trace) = header(CLOUD_TRACE_HEADER).and_then(|h| cloud_trace(h, service_name)) {
            return Self::new(trace);
        }

        match header(REQUEST_ID_HEADER).map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self::new(id),
            None => Self::new(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Span carrying the correlation id for everything logged during `route`.
    pub fn span(&self, route: &'static str) -> tracing::Span {
        tracing::info_span!("request", route, trace = %self.correlation_id)
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.correlation_id)
    }
}

/// Format the trace id of an `X-Cloud-Trace-Context` value for Cloud Logging.
///
/// Returns `None` when the header carries no trace id.
pub fn cloud_trace(header: &str, service_name: &str) -> Option<String> {
    let trace_id = header.split('/').next()?.trim();
    if trace_id.is_empty() {
        return None;
    }
    Some(format!("projects/{}/traces/{}", service_name, trace_id))
}
