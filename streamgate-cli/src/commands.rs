//! CLI command implementations

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use streamgate_core::{GatewayConfig, resolve_data_dir};
use streamgate_web::GatewayClient;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Add torrents and stream their media until interrupted
    Serve {
        /// Magnet links, metafile URLs or metafile paths
        sources: Vec<String>,

        #[command(flatten)]
        gateway: GatewayArgs,

        /// Host to bind to
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Seconds to wait for each torrent's metadata
        #[arg(long)]
        metadata_timeout: Option<u64>,
    },
    /// Print the data directory a client would use
    DataDir {
        #[command(flatten)]
        gateway: GatewayArgs,
    },
}

/// Options shared by every command
#[derive(Args)]
pub struct GatewayArgs {
    /// Client name, also the data directory name
    #[arg(short, long)]
    name: Option<String>,

    /// Root under which the data directory is created (default: user cache dir)
    #[arg(long)]
    data_root: Option<PathBuf>,
}

impl GatewayArgs {
    /// Environment configuration with command-line overrides on top.
    fn config(self) -> GatewayConfig {
        let mut config = GatewayConfig::from_env();
        if let Some(name) = self.name {
            config.client.name = name;
        }
        if let Some(root) = self.data_root {
            config.storage.root_dir = Some(root);
        }
        config
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            sources,
            gateway,
            host,
            port,
            metadata_timeout,
        } => {
            let mut config = gateway.config();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(secs) = metadata_timeout {
                config.torrent.metadata_timeout = Duration::from_secs(secs);
            }
            serve(config, sources).await
        }
        Commands::DataDir { gateway } => {
            let config = gateway.config();
            let data_dir =
                resolve_data_dir(&config.client.name, config.storage.root_dir.as_deref())?;
            println!("{}", data_dir.display());
            Ok(())
        }
    }
}

/// Starts a client, adds every source and serves until Ctrl-C.
///
/// A source that fails to add is reported and skipped.
///
/// # Errors
/// - Client start-up failures (data directory, bind address)
/// - Shutdown signal handler failures
pub async fn serve(config: GatewayConfig, sources: Vec<String>) -> anyhow::Result<()> {
    let client = GatewayClient::init(config)
        .await
        .context("Failed to start gateway")?;
    println!("Streaming server on http://{}", client.local_addr());
    println!("  Data directory: {}", client.data_dir().display());

    for source in &sources {
        match client.add_torrent(source).await {
            Ok(torrent) => {
                println!("{}", torrent.name());
                println!("  {}", client.stream_url(&torrent));
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", source, e);
                eprintln!("Failed to add {source}: {e}");
            }
        }
    }

    if client.list_torrents().is_empty() {
        println!("No torrents added. Serving anyway; press Ctrl-C to stop.");
    } else {
        println!("Press Ctrl-C to stop.");
    }

    let signal = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down");

    let errors = client.close().await;
    for error in &errors {
        eprintln!("Shutdown error: {error}");
    }
    signal.context("Failed to listen for Ctrl-C")?;
    if !errors.is_empty() {
        anyhow::bail!("{} errors during shutdown", errors.len());
    }
    Ok(())
}
