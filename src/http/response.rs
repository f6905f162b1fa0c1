//! Response helpers.
//!
//! # Responsibilities
//! - Attach the correlation id to every response
//! - Map pipeline errors to HTTP status codes and plain-text bodies
//!
//! # Design Decisions
//! - Bodies are short plain text (`404 - Not Found`); details stay in the logs

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::observability::trace::CORRELATION_HEADER;
use crate::observability::TraceContext;
use crate::report::ReportError;

/// Plain-text body for a status: `503 - Service Unavailable`.
pub fn status_body(status: StatusCode) -> String {
    format!(
        "{} - {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    )
}

/// Add the `x-correlation-id` header.
pub fn with_correlation(response: impl IntoResponse, ctx: &TraceContext) -> Response {
    let mut response = response.into_response();
    if let Ok(value) = HeaderValue::from_str(ctx.correlation_id()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Log a failed report and turn it into an error-class response.
pub fn error_response(err: &ReportError, ctx: &TraceContext) -> Response {
    let status = err.status_code();
    tracing::error!(
        trace = %ctx,
        status = status.as_u16(),
        error = %err,
        "Stats report failed"
    );
    with_correlation((status, status_body(status)), ctx)
}
