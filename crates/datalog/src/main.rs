use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use datalog_core::{logging, Config, IntervalTicker, Poller};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Clean datalog exports and serve the results over HTTP",
    long_about = None
)]
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

    let cleaner = supervise("cleaner", spawn_cleaner(config.clone(), shutdown_rx.clone()));
    let host = supervise(
        "file host",
        tokio::spawn(async move { datalog_host::serve(&config, shutdown_rx).await }),
    );

    // shutdown_tx must outlive both tasks
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }

    let _ = tokio::join!(cleaner, host);
    Ok(())
}

fn spawn_cleaner(config: Config, shutdown: watch::Receiver<bool>) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let interval = config.processing_interval;
        let mut poller =
            Poller::from_config(config).context("failed to open processed-file registry")?;
        info!(interval_secs = interval.as_secs_f64(), "datalog cleaner started");
        poller
            .run(&mut IntervalTicker::new(interval, shutdown))
            .await;
        Ok(())
    })
}

/// Logs the task's outcome as soon as it ends. The other task keeps running.
fn supervise(task: &'static str, handle: JoinHandle<Result<()>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => info!(task, "task stopped"),
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                error!(task, error = %message, "task failed");
            }
            Err(err) => error!(task, error = %err, "task panicked"),
        }
    })
}
