//! JSON configuration shared by the cleaner and the file host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use datalog_parser::delimiter::parse_single_delimiter;
use datalog_parser::{DelimiterChoice, NormalizeOptions};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use crate::line_filter::DEFAULT_SENTINEL;
use crate::logging::LogFormat;
use crate::registry::RegistryConfig;
use crate::selection::FileSelection;

const TEMP_SUBDIRECTORY: &str = "datalog-cleaner";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub output_file_prefix: String,
    #[serde(deserialize_with = "deserialize_interval")]
    pub processing_interval: Duration,
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub delimiter: DelimiterChoice,
    #[serde(
        default = "default_output_delimiter",
        deserialize_with = "deserialize_output_delimiter"
    )]
    pub output_delimiter: u8,
    #[serde(default = "default_sentinel_markers")]
    pub sentinel_markers: Vec<String>,
    #[serde(default)]
    pub file_selection: FileSelection,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_server_host() -> String {
    "localhost".to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_output_delimiter() -> u8 {
    b','
}

fn default_sentinel_markers() -> Vec<String> {
    vec![DEFAULT_SENTINEL.to_string()]
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(de::Error::custom(format!(
            "processing_interval must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
}

fn deserialize_output_delimiter<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_single_delimiter(&raw).map_err(de::Error::custom)
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sentinel_markers.iter().any(|marker| marker.is_empty()) {
            return Err(ConfigError::Validation(
                "sentinel_markers must not contain empty strings".to_string(),
            ));
        }
        if self.output_file_prefix.is_empty() && same_directory(&self.input_directory, &self.output_directory) {
            return Err(ConfigError::Validation(
                "output_file_prefix must not be empty when output_directory is the input directory"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            delimiter: self.delimiter,
            output_delimiter: self.output_delimiter,
        }
    }

    pub fn temp_directory(&self) -> PathBuf {
        self.temp_directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(TEMP_SUBDIRECTORY))
    }

    /// Destination of the cleaned copy of `file_name`.
    pub fn cleaned_path(&self, file_name: &str) -> PathBuf {
        self.output_directory
            .join(format!("{}{}", self.output_file_prefix, file_name))
    }

    /// Creates the output and temp directories. The input directory belongs to the producer
    /// and is left alone.
    pub fn ensure_directories(&self) -> io::Result<()> {
        fs::create_dir_all(&self.output_directory)?;
        fs::create_dir_all(self.temp_directory())
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
