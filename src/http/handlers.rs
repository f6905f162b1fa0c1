//! Route handlers.

use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::Response,
};
use tracing::Instrument;

use crate::http::response::{error_response, status_body, with_correlation};
use crate::http::server::AppState;
use crate::observability::{metrics, TraceContext};

pub const INDEX_ROUTE: &str = "/";
pub const STATS_ROUTE: &str = "/getMailchimpStats";

/// `GET /`.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let ctx = TraceContext::from_headers(&headers, &state.service_name);
    tracing::debug!(trace = %ctx, "Index handler");

    metrics::record_request(INDEX_ROUTE, 200, start);
    with_correlation((StatusCode::OK, "indexHandler"), &ctx)
}

/// Every path without a route.
pub async fn not_found(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let ctx = TraceContext::from_headers(&headers, &state.service_name);
    tracing::info!(trace = %ctx, path = %uri.path(), "Unknown path");

    metrics::record_request("unmatched", 404, start);
    with_correlation(
        (StatusCode::NOT_FOUND, status_body(StatusCode::NOT_FOUND)),
        &ctx,
    )
}

/// `GET /getMailchimpStats`: collect the counts and post them to chat.
pub async fn get_mailchimp_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let ctx = TraceContext::from_headers(&headers, &state.service_name);
    let span = ctx.span(STATS_ROUTE);

    let result = state
        .reporter
        .run_within(&ctx, state.write_deadline)
        .instrument(span.clone())
        .await;

    let response = span.in_scope(|| match result {
        Ok(report) => {
            tracing::info!(
                trace = %ctx,
                total = report.total,
                chat_status = %report.chat_status,
                "Stats relayed"
            );
            with_correlation((StatusCode::OK, "OK"), &ctx)
        }
        Err(err) => error_response(&err, &ctx),
    });

    metrics::record_request(STATS_ROUTE, response.status().as_u16(), start);
    response
}
