//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, body read timeout, request ID)
//! - Accept connections and hand them to the connection driver
//! - Drain in-flight connections on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::any, Router};
use tokio::sync::{broadcast, watch};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::RequestBodyTimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{RelayConfig, TimeoutConfig};
use crate::http::handlers::{self, INDEX_ROUTE, STATS_ROUTE};
use crate::net::connection::{serve_connection, ConnectionSettings, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::report::StatsReporter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub reporter: Arc<StatsReporter>,
    pub service_name: Arc<str>,
    /// Budget for one stats run; expiry answers 504 from the handler.
    pub write_deadline: Duration,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server around a ready-made reporter.
    pub fn new(config: RelayConfig, reporter: Arc<StatsReporter>) -> Self {
        let state = AppState {
            reporter,
            service_name: Arc::from(config.service.name.as_str()),
            write_deadline: Duration::from_secs(config.timeouts.write_secs),
        };
        let router = build_router(state, &config.timeouts);
        Self { router, config }
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve connections from `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let settings = ConnectionSettings::from_config(&self.config);
        let tracker = ConnectionTracker::new();
        let (drain_tx, drain_rx) = watch::channel(false);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = tracker.track();
                        let router = self.router.clone();
                        let settings = settings.clone();
                        let drain = drain_rx.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, peer, guard.id(), router, settings, drain).await;
                            drop(guard);
                            drop(permit);
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }

        let _ = drain_tx.send(true);
        let deadline = Duration::from_secs(self.config.timeouts.write_secs);
        if tokio::time::timeout(deadline, tracker.wait_for_shutdown()).await.is_err() {
            tracing::warn!(
                active = tracker.active_count(),
                "Connections still open after drain deadline"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// The write deadline is applied inside the stats handler so an expired run
/// still gets a logged, correlated error response.
pub fn build_router(state: AppState, timeouts: &TimeoutConfig) -> Router {
    Router::new()
        .route(INDEX_ROUTE, any(handlers::index))
        .route(STATS_ROUTE, any(handlers::get_mailchimp_stats))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(timeouts.read_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
