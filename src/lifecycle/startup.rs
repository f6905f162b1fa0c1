//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Build the report collaborators
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::chat::WebhookNotifier;
use crate::config::{load_config, ConfigError, RelayConfig};
use crate::http::HttpServer;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::Shutdown;
use crate::mailchimp::MailchimpClient;
use crate::net::{Listener, ListenerError};
use crate::observability::{logging, metrics};
use crate::report::{ReportSettings, StatsReporter};
use crate::secrets;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid metrics address {address}")]
    MetricsAddress { address: String },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Listen(#[from] ListenerError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Wire the secret store, Mailchimp client and chat notifier around one
/// shared HTTP client.
pub fn build_reporter(config: &RelayConfig) -> Result<StatsReporter, StartupError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()?;

    let secrets = secrets::from_config(client.clone(), &config.secrets, &config.retries);
    let lists = MailchimpClient::new(client.clone(), &config.mailchimp, config.retries.clone());
    let chat = WebhookNotifier::new(client, Duration::from_secs(config.chat.timeout_secs));

    Ok(StatsReporter::new(
        secrets,
        Arc::new(lists),
        Arc::new(chat),
        ReportSettings::from_config(config),
    ))
}

/// Serve `config` on an already bound listener until `shutdown` fires.
pub async fn serve(
    config: RelayConfig,
    listener: Listener,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    let reporter = build_reporter(&config)?;
    let server = HttpServer::new(config, Arc::new(reporter));
    server
        .run(listener, shutdown)
        .await
        .map_err(StartupError::Serve)
}

/// Full process startup: config, logging, metrics, bind, serve until signalled.
pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), StartupError> {
    let mut config = load_config(config_path)?;
    if let Some(port) = port_override {
        config.listener.port = port;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service.name,
        "stats-relay starting"
    );

    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr: SocketAddr = address.parse().map_err(|_| StartupError::MetricsAddress {
            address: address.clone(),
        })?;
        metrics::init_metrics(addr)?;
    }

    let address = config.bind_address();
    let listener = Listener::bind(&address, config.listener.max_connections).await?;
    tracing::info!(
        address = %address,
        max_connections = config.listener.max_connections,
        list_id = %config.mailchimp.list_id,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    let result = serve(config, listener, shutdown.subscribe()).await;
    signals.abort();

    tracing::info!("Shutdown complete");
    result
}
