//! PMU Monitor CLI
//!
//! Command-line entry point for the grid monitoring console.

use std::path::PathBuf;

use clap::Parser;
use pmu_monitor::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "pmu-monitor")]
#[command(about = "Monitoring console for phasor measurement unit telemetry")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Console port (overrides config file)
    #[arg(long)]
    port: Option<u16>,

    /// Backend base URL (overrides config file)
    #[arg(long)]
    backend_url: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, port={:?}, backend_url={:?}, log_level={:?}",
        args.config,
        args.port,
        args.backend_url,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(port) = args.port {
        config.dashboard.port = port;
    }
    if let Some(backend_url) = args.backend_url {
        config.backend.base_url = backend_url;
    }

    tracing::info!("Starting PMU monitor against {}", config.backend.base_url);
    tracing::debug!(
        "Alerts: {}, Notifiers: {}, Store: {:?}",
        config.alerts.enabled,
        config.notifiers.len(),
        config.store.path
    );

    pmu_monitor::run(config).await?;

    Ok(())
}
