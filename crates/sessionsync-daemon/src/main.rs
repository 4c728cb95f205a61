//! SessionSync Daemon - Main entry point
//!
//! Runs console discovery and serves the results over REST and WebSocket.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sessionsync")]
#[command(about = "Mixing console discovery daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sessionsync.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan and exit
    #[arg(long)]
    scan_once: bool,

    /// Write the default configuration to --config and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("SessionSync v{}", env!("CARGO_PKG_VERSION"));

    if args.write_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        rescan_secs = config.discovery.rescan_interval_secs,
        passive = config.discovery.passive,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone())?;

    if args.scan_once {
        info!("Running single discovery scan");
        let launched = state.session.scan_once().await;
        // Let the last bulk probes and their confirmations finish
        let settle = config.discovery.probe_timeout(sessionsync_discovery::ScanMode::Bulk)
            + config.discovery.verify_timeout();
        tokio::time::sleep(settle).await;

        let devices = state.session.snapshot().await;
        println!("Probed {} targets, found {} consoles:", launched, devices.len());
        for device in devices {
            println!(
                "  - {} ({}) at {}:{} [{:?}]",
                device.name, device.model, device.ip, device.port, device.verification
            );
        }
    } else {
        server::run(state, &config.daemon.bind).await?;
    }

    Ok(())
}
