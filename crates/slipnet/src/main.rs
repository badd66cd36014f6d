//! SlipNet - tunnel profile manager
//!
//! Manages stored tunnel profiles, app settings and usage statistics from
//! the command line.

mod commands;
mod config;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use commands::Command;
use config::AppConfig;
use slipnet_store::{Backend, ConfigStore, JsonFileBackend};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "slipnet", version, about = "Manage SlipNet tunnel profiles and settings")]
struct Cli {
    /// Config file (TOML). Defaults to <config dir>/slipnet/config.toml if present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = Some(dir);
    }
    let data_dir = config.data_dir();
    let backend = JsonFileBackend::in_dir(&data_dir);

    // The persisted debug flag is needed before the subscriber exists
    let debug_logging = backend
        .load()
        .await
        .ok()
        .flatten()
        .is_some_and(|doc| doc.settings.debug_logging);
    let directive = logging::filter_directive(config.logging.level.as_deref(), debug_logging);
    logging::init_tracing(&directive, cli.json_logs || config.logging.json);

    debug!("Using data directory {}", data_dir.display());

    let store = ConfigStore::open(backend)
        .await
        .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;

    commands::run(&store, cli.command).await
}
