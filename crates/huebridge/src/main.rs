//! artnet-hue-entertainment - control Philips Hue lights with Art-Net
//!
//! Streams DMX from one Art-Net universe to a Hue entertainment room.

mod commands;
mod config;
mod logging_setup;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use huebridge_control::BridgeOrchestrator;

use crate::config::Config;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "artnet-hue-entertainment")]
#[command(about = "Control Philips/Signify Hue lights using ArtNet")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover all Hue bridges on your network
    Discover,
    /// Pair with a Hue bridge. Press the link button on the bridge before running
    Pair {
        /// IP address of the Hue bridge (IPv4 or IPv6)
        #[arg(long)]
        ip: String,
    },
    /// List all available entertainment rooms
    ListRooms,
    /// List all available lights
    ListLights,
    /// Flash a light to identify it
    PingLight {
        /// Light id, or "all" to flash every light in turn
        #[arg(long)]
        id: String,
    },
    /// Rename every light after its id
    RenameLightsAfterId,
    /// Run the Art-Net to Hue bridge
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let created = !cli.config.exists();
    let config = match Config::load_or_create(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging_setup::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if created {
        info!("Created default configuration file {:?}", cli.config);
    }

    match dispatch(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Discover => commands::discover().await,
        Command::Pair { ip } => commands::pair(&cli.config, config, &ip).await,
        Command::ListRooms => commands::list_rooms(&config).await,
        Command::ListLights => commands::list_lights(&config).await,
        Command::PingLight { id } => commands::ping_light(&config, &id).await,
        Command::RenameLightsAfterId => commands::rename_lights_after_id(&config).await,
        Command::Run => run(&config).await,
    }
}

async fn run(config: &Config) -> Result<()> {
    let bridge_config = config.bridge_config()?;

    let (stop_tx, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = stop_tx.send(true);
    });

    BridgeOrchestrator::new(bridge_config, shutdown)?.run().await?;
    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C");
}
