//! Readiness gate server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                READINESS GATE                │
//!     Client Request     │  ┌──────────┐   ┌──────────────────────────┐ │
//!     ───────────────────┼─▶│  http    │──▶│ gate: poll dependencies  │─┼──▶ status endpoints
//!                        │  │  server  │   │   ("started"?)           │ │
//!                        │  └──────────┘   └────────────┬─────────────┘ │
//!                        │                              ▼               │
//!     Client Response    │  ┌──────────┐   ┌──────────────────────────┐ │
//!     ◀──────────────────┼──│ replay / │◀──│ capture upstream reply,  │─┼──▶ upstream
//!                        │  │ error    │   │ retry while 502          │ │
//!                        │  └──────────┘   └──────────────────────────┘ │
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use readiness_gate::config::loader::load_config;
use readiness_gate::observability::{logging, metrics};
use readiness_gate::{HttpServer, ProxyConfig, Shutdown};

#[derive(Parser)]
#[command(name = "readiness-gate")]
#[command(about = "Hold HTTP requests until dependent services are ready", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "readiness-gate starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
