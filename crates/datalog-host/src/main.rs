use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use datalog_core::{logging, Config};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve cleaned datalogs over HTTP", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    logging::init(config.log_format)?;
    config
        .ensure_directories()
        .context("failed to create output directories")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
        }
    });

    datalog_host::serve(&config, shutdown_rx).await
}
