//! Netradar Daemon - Main entry point
//!
//! Runs LAN discovery and serves the REST/WebSocket API.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use netradar_discovery::ScanEvent;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netradar")]
#[command(about = "LAN device discovery and classification daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netradar.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan, print the results, and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("netradar v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    let state = state::AppState::new(config.clone())?;

    if args.scan_once {
        scan_once(&state).await
    } else {
        server::run(state, &config.daemon.bind).await
    }
}

/// Single scan mode: run one discovery cycle and print the results
async fn scan_once(state: &state::AppState) -> Result<()> {
    info!("Running single discovery scan");

    // Subscribe before starting so no event is missed
    let mut events = state.subscribe();
    state
        .scanner
        .start_scan()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    loop {
        match events.recv().await? {
            ScanEvent::ScanCompleted(result) => {
                println!(
                    "Discovered {} devices on {} in {:.0} ms:",
                    result.devices.len(),
                    result.network_cidr,
                    result.scan_duration_ms
                );
                for device in result.devices {
                    println!(
                        "  - {} ({}) {:?} {}",
                        device.ip,
                        device.mac,
                        device.device_type,
                        device.hostname.as_deref().unwrap_or("-"),
                    );
                }
                return Ok(());
            }
            ScanEvent::ScanError { message } => {
                anyhow::bail!("scan failed: {message}");
            }
            _ => {}
        }
    }
}
