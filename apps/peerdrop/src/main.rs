//! peerdrop: send files to a peer in the same room.

mod app;
mod config;
mod files;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Peer-to-peer file drop
#[derive(Parser)]
#[command(name = "peerdrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (default: ~/.config/peerdrop/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send files to a receiving peer
    Send {
        /// Files to send, one after another
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Receiver address (host:port)
        #[arg(short, long)]
        peer: String,

        /// Room name shared with the receiver
        #[arg(short, long)]
        room: Option<String>,
    },

    /// Wait for a peer and save the files it sends
    Receive {
        /// Listen address
        #[arg(short, long)]
        listen: Option<String>,

        /// Room name shared with the sender
        #[arg(short, long)]
        room: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_path);
    let config = Config::load_or_create(&config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");
    let transfer_config = config.transfer_config()?;

    match cli.command {
        Commands::Send { files, peer, room } => {
            let room = room.unwrap_or_else(|| config.room.clone());
            app::send(&files, &peer, &room, transfer_config).await?;
        }
        Commands::Receive {
            listen,
            room,
            output,
        } => {
            let listen = listen.unwrap_or_else(|| config.listen.clone());
            let room = room.unwrap_or_else(|| config.room.clone());
            let output = output.unwrap_or_else(|| config.output_dir.clone());

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupted, shutting down");
                    ctrl_c.cancel();
                }
            });

            app::receive(&listen, &room, &output, transfer_config, cancel).await?;
        }
    }

    Ok(())
}
