//! multiserve: the computation benchmark served from several workers.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                  PROCESS                     │
//!                      │                                              │
//!                      │  ┌────────────┐  Worker Channel  ┌────────┐  │
//!   SIGINT / SIGTERM ──┼─▶│   boss     │◀────────────────▶│worker 1│  │
//!                      │  │ (instance 0│◀──────────┐      └───┬────┘  │
//!                      │  │  + fan-out)│           │      ┌───┴────┐  │
//!                      │  └─────┬──────┘           └─────▶│worker N│  │
//!                      │        │                         └───┬────┘  │
//!                      │        ▼                              ▼       │
//!                      │   ┌──────────────────────────────────────┐   │
//!   Clients ───────────┼──▶│   address:port (SO_REUSEPORT, kernel │   │
//!                      │   │   spreads connections over listeners)│   │
//!                      │   └──────────────────────────────────────┘   │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use multiserve::config::{load_config, ServiceConfig};
use multiserve::observability::{logging, metrics};
use multiserve::{computation, serve_multi_process, ServerHandle};

#[derive(Parser)]
#[command(name = "multiserve")]
#[command(about = "Serve the computation benchmark from several workers on one port", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured number of listeners.
    #[arg(short, long)]
    isolates: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(isolates) = cli.isolates {
        config.server.isolates = isolates;
    }

    logging::init_logging(&config.observability.log_filter);
    tracing::info!("multiserve v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        address = %config.server.address,
        port = config.server.port,
        isolates = config.server.isolates,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = config.address()?;
    let mut options = config.serve_options()?;
    options.on_close = Some(multiserve::on_close(|instance| async move {
        tracing::info!(instance, "Instance closing");
        Ok(())
    }));

    let server = serve_multi_process(computation::router, address, config.server.port, options).await?;
    tracing::info!(address = %server.local_addr(), "Ready");

    if config.server.install_signal_handler {
        // The signal watcher closes every worker and exits the process.
        std::future::pending::<()>().await;
    } else {
        multiserve::lifecycle::signals::termination_signal().await;
        server.close(false).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
