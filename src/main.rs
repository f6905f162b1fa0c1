//! stats-relay: reads Mailchimp audience counts and posts them to a chat webhook.
//!
//! ```text
//!   GET /getMailchimpStats
//!        │
//!        ▼
//!   ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//!   │  http    │──▶│  secrets  │──▶│ mailchimp │──▶│   chat   │
//!   │ handlers │   │ (API key) │   │  counts   │   │ webhook  │
//!   └──────────┘   └───────────┘   └───────────┘   └──────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "stats-relay", version, about = "Relay Mailchimp list stats to a chat webhook")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port (overrides config and PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = stats_relay::lifecycle::run(cli.config.as_deref(), cli.port).await {
        // Logging may not be up yet when startup fails.
        eprintln!("stats-relay: {e}");
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}
