//! Forward proxy with CONNECT tunneling and access alerts.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                    FORWARD PROXY                      │
//!                          │                                                       │
//!     Client Request       │  ┌─────────┐    ┌──────────┐   CONNECT  ┌──────────┐  │
//!     ─────────────────────┼─▶│  http   │───▶│ dispatch │───────────▶│  tunnel  │◀─┼──▶ Target
//!                          │  │ server  │    │          │            │ (bytes)  │  │    host:port
//!                          │  └─────────┘    └────┬─────┘            └──────────┘  │
//!                          │                      │ other methods                  │
//!                          │                      ▼                                │
//!     Client Response      │                ┌──────────┐                           │
//!     ◀────────────────────┼────────────────│  relay   │◀──────────────────────────┼──── Origin
//!                          │                │ (hyper)  │                           │     server
//!                          │                └──────────┘                           │
//!                          │                                                       │
//!                          │  ┌─────────────────────────────────────────────────┐  │
//!                          │  │ audit: access log line + queued alert (worker)  │──┼──▶ Telegram
//!                          │  └─────────────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::load_config;
use forward_proxy::lifecycle::{self, StartupError};
use forward_proxy::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "forward-proxy", version, about = "Forward proxy with CONNECT tunneling and access alerts")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Configuration problems are fatal before any listener opens.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            tracing::error!(error = %e, "Configuration rejected");
            return Err(StartupError::from(e).into());
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!(
        http_address = %config.listener.http_address,
        tls = config.tls.enabled,
        access_log = %config.access_log.path,
        "forward-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    lifecycle::run(config).await?;
    Ok(())
}
