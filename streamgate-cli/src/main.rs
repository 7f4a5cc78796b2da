//! Streamgate CLI - serve torrents over HTTP from the command line

mod commands;

use std::path::PathBuf;

use clap::Parser;
use streamgate_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(about = "Stream the media inside torrents over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level; RUST_LOG overrides it
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the per-run log file
    #[arg(long, default_value = "logs")]
    logs_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), Some(&cli.logs_dir))?;

    commands::handle_command(cli.command).await
}
