//! Relay binary entry point.
//!
//! Loads the TOML configuration, initializes logging and metrics, starts the
//! relay, and stops it gracefully on Ctrl-C.

use std::path::PathBuf;

use clap::Parser;

use proxy_relay::config::load_config;
use proxy_relay::observability::{logging, metrics};
use proxy_relay::ProxyServer;

#[derive(Debug, Parser)]
#[command(name = "proxy-relay", about = "TLS relay for framed game traffic")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init(&config.observability);

    tracing::info!(
        config_path = %args.config.display(),
        bind_address = %config.listener.bind_address,
        targets = config.targets.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let handle = ProxyServer::start(config).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received");

    handle.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
