//! The polling loop that drives line filtering and normalization.
//!
//! A [`Poller`] owns the configuration and the [`ProcessedFileRegistry`]. Each call to
//! [`Poller::run_cycle`] lists the input directory once and processes every due file, one
//! at a time. [`Poller::run`] repeats cycles for as long as its [`Ticker`] keeps ticking,
//! which lets tests drive an exact number of cycles without sleeping.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datalog_parser::NormalizeOptions;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::line_filter::LineFilter;
use crate::normalize::{normalize_file, NormalizeSummary};
use crate::registry::{ProcessedFileRegistry, RegistryError};

/// Suffix of working copies; such files are never picked up as sources.
pub const WORKING_SUFFIX: &str = ".tmp";

#[async_trait]
pub trait Ticker: Send {
    /// Waits for the next cycle. `false` stops the loop.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker that stops once the shutdown channel reads `true`.
///
/// The first tick completes immediately; a cycle that overruns the period delays the next
/// tick instead of bursting.
pub struct IntervalTicker {
    interval: Interval,
    shutdown: watch::Receiver<bool>,
    detached: bool,
}

impl IntervalTicker {
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            shutdown,
            detached: false,
        }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        loop {
            if *self.shutdown.borrow() {
                return false;
            }
            if self.detached {
                // nobody can signal shutdown any more
                self.interval.tick().await;
                return true;
            }
            tokio::select! {
                _ = self.interval.tick() => return !*self.shutdown.borrow(),
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        self.detached = true;
                    }
                }
            }
        }
    }
}

/// Yields a fixed number of ticks without waiting.
#[derive(Debug, Clone, Copy)]
pub struct BoundedTicker {
    remaining: usize,
}

impl BoundedTicker {
    pub fn new(cycles: usize) -> Self {
        Self { remaining: cycles }
    }
}

#[async_trait]
impl Ticker for BoundedTicker {
    async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Outcome of one cycle, by source file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone)]
struct SourceFile {
    name: String,
    path: PathBuf,
    modified_at: DateTime<Utc>,
}

/// Removes the working copy when dropped, whatever happened to it.
struct WorkingFile {
    path: PathBuf,
}

impl WorkingFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove working file"
            ),
        }
    }
}

pub struct Poller {
    config: Config,
    filter: LineFilter,
    options: NormalizeOptions,
    temp_directory: PathBuf,
    registry: ProcessedFileRegistry,
}

impl Poller {
    pub fn new(config: Config, registry: ProcessedFileRegistry) -> Self {
        let filter = LineFilter::new(&config.sentinel_markers);
        let options = config.normalize_options();
        let temp_directory = config.temp_directory();
        Self {
            config,
            filter,
            options,
            temp_directory,
            registry,
        }
    }

    /// Builds the registry described by the `registry` config section.
    pub fn from_config(config: Config) -> std::result::Result<Self, RegistryError> {
        let registry = ProcessedFileRegistry::from_config(&config.registry)?;
        Ok(Self::new(config, registry))
    }

    pub fn registry(&self) -> &ProcessedFileRegistry {
        &self.registry
    }

    /// Runs cycles until the ticker stops and returns how many ran. Cycle failures are
    /// logged, never returned.
    ///
    /// On a multi-threaded runtime the cycle's blocking file I/O runs under
    /// [`task::block_in_place`], so other tasks move to the remaining workers.
    pub async fn run<T>(&mut self, ticker: &mut T) -> usize
    where
        T: Ticker + ?Sized,
    {
        let mut cycles = 0usize;
        while ticker.tick().await {
            cycles += 1;
            match run_blocking(|| self.run_cycle()) {
                Ok(report) => info!(
                    cycle = cycles,
                    processed = report.processed.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "cleaning cycle finished"
                ),
                Err(err) => error!(cycle = cycles, error = %err, "cleaning cycle failed"),
            }
        }
        info!(cycles, "poller stopped");
        cycles
    }

    /// One pass over the input directory. Per-file failures are logged and reported, and
    /// leave the registry untouched unless the record policy says otherwise.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        if let Err(err) = self.registry.begin_cycle() {
            error!(error = %err, "failed to persist registry reset");
        }

        let sources = self.eligible_files()?;
        let mut report = CycleReport::default();

        for source in sources {
            if !self.registry.should_process(&source.name, source.modified_at) {
                debug!(file = %source.name, "unchanged since last cycle");
                report.skipped.push(source.name);
                continue;
            }

            let succeeded = match self.process_file(&source) {
                Ok(summary) => {
                    info!(
                        file = %source.name,
                        rows = summary.rows,
                        warnings = summary.warnings,
                        "cleaned datalog"
                    );
                    true
                }
                Err(err) => {
                    error!(file = %source.name, error = %err, "failed to clean datalog");
                    false
                }
            };

            if let Err(err) = self
                .registry
                .finish(&source.name, source.modified_at, succeeded)
            {
                error!(file = %source.name, error = %err, "failed to update registry");
            }

            if succeeded {
                report.processed.push(source.name);
            } else {
                report.failed.push(source.name);
            }
        }

        Ok(report)
    }

    fn process_file(&self, source: &SourceFile) -> Result<NormalizeSummary> {
        let working = WorkingFile {
            path: self
                .temp_directory
                .join(format!("{}{}", source.name, WORKING_SUFFIX)),
        };
        let destination = self.config.cleaned_path(&source.name);

        let stats = self.filter.filter_file(&source.path, working.path())?;
        debug!(file = %source.name, removed = stats.removed, "working copy ready");

        normalize_file(working.path(), &destination, &self.options)
    }

    fn eligible_files(&self) -> Result<Vec<SourceFile>> {
        let input = &self.config.input_directory;
        let entries = fs::read_dir(input).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                PipelineError::DirectoryNotFound {
                    path: input.clone(),
                }
            } else {
                PipelineError::Read {
                    path: input.clone(),
                    source,
                }
            }
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(directory = %input.display(), error = %err, "failed to read directory entry");
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping file with non UTF-8 name");
                continue;
            };
            if name.ends_with(WORKING_SUFFIX) || !self.config.file_selection.matches(&name) {
                continue;
            }

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to stat file");
                    continue;
                }
            };
            let modified_at = match metadata.modified() {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "modification time unavailable");
                    continue;
                }
            };

            files.push(SourceFile {
                name,
                path,
                modified_at,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(f)
        }
        _ => f(),
    }
}
