use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use datalog_core::{logging, BoundedTicker, Config, IntervalTicker, Poller};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Clean datalog exports into normalized CSV", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,
    /// Run a single cleaning cycle and exit
    #[arg(long)]
    once: bool,
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

    let interval = config.processing_interval;
    let mut poller = Poller::from_config(config).context("failed to open processed-file registry")?;

    if cli.once {
        poller.run(&mut BoundedTicker::new(1)).await;
        return Ok(());
    }

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

    info!(interval_secs = interval.as_secs_f64(), "datalog cleaner started");
    poller
        .run(&mut IntervalTicker::new(interval, shutdown_rx))
        .await;
    Ok(())
}
