// crates/datalog-core/src/error.rs

use std::io;
use std::path::PathBuf;

use datalog_parser::NormalizeError;
use thiserror::Error;

use crate::registry::RegistryError;

/// Failures of one cycle or one file. None of these stop the poll loop.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input directory does not exist: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: NormalizeError,
    },

    #[error("missing required columns in {}: {}", .path.display(), .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
