//! Bookkeeping of which source files have already been cleaned.
//!
//! The registry maps a source file name to the modification time of the version that was
//! last processed. It is owned by the [`Poller`](crate::Poller) and persisted through a
//! [`RegistryStore`], so whether a restart reprocesses everything is a configuration choice.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to access registry index {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registry index {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How the registry gates reprocessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    /// Reprocess a file only when its modification time moved forward.
    #[default]
    Incremental,
    /// Forget everything at the start of each cycle.
    AlwaysReprocess,
}

/// When a processing attempt is written to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    #[default]
    OnSuccess,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFileRecord {
    pub modified_at: DateTime<Utc>,
}

pub type RegistryEntries = BTreeMap<String, ProcessedFileRecord>;

pub trait RegistryStore: Send {
    fn load(&self) -> Result<RegistryEntries, RegistryError>;
    fn save(&self, entries: &RegistryEntries) -> Result<(), RegistryError>;
}

/// Nothing survives the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryStore;

impl RegistryStore for InMemoryStore {
    fn load(&self) -> Result<RegistryEntries, RegistryError> {
        Ok(RegistryEntries::new())
    }

    fn save(&self, _entries: &RegistryEntries) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Small JSON index on disk, rewritten after every update.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RegistryStore for JsonFileStore {
    fn load(&self) -> Result<RegistryEntries, RegistryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(RegistryEntries::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&raw).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &RegistryEntries) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let json = serde_json::to_vec_pretty(entries).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let staging = self.path.with_extension("json.partial");
        fs::write(&staging, json).map_err(|err| self.io_error(err))?;
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }
}

/// `registry` section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub mode: RegistryMode,
    pub update: RecordPolicy,
    pub index_path: Option<PathBuf>,
}

pub struct ProcessedFileRegistry {
    entries: RegistryEntries,
    store: Box<dyn RegistryStore>,
    mode: RegistryMode,
    policy: RecordPolicy,
}

impl std::fmt::Debug for ProcessedFileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedFileRegistry")
            .field("entries", &self.entries)
            .field("mode", &self.mode)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for ProcessedFileRegistry {
    fn default() -> Self {
        Self::in_memory(RegistryMode::default(), RecordPolicy::default())
    }
}

impl ProcessedFileRegistry {
    pub fn new(
        mode: RegistryMode,
        policy: RecordPolicy,
        store: Box<dyn RegistryStore>,
    ) -> Result<Self, RegistryError> {
        let entries = store.load()?;
        Ok(Self {
            entries,
            store,
            mode,
            policy,
        })
    }

    pub fn in_memory(mode: RegistryMode, policy: RecordPolicy) -> Self {
        Self {
            entries: RegistryEntries::new(),
            store: Box::new(InMemoryStore),
            mode,
            policy,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        match &config.index_path {
            Some(path) => Self::new(
                config.mode,
                config.update,
                Box::new(JsonFileStore::new(path.clone())),
            ),
            None => Ok(Self::in_memory(config.mode, config.update)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, file_name: &str) -> Option<&ProcessedFileRecord> {
        self.entries.get(file_name)
    }

    /// True when the file has no entry or its modification time is strictly newer.
    pub fn should_process(&self, file_name: &str, modified_at: DateTime<Utc>) -> bool {
        match self.entries.get(file_name) {
            Some(record) => record.modified_at < modified_at,
            None => true,
        }
    }

    /// Upserts the entry for `file_name`.
    pub fn record(
        &mut self,
        file_name: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.entries
            .insert(file_name.to_string(), ProcessedFileRecord { modified_at });
        self.store.save(&self.entries)
    }

    /// Applies the record policy to a finished attempt; returns whether an entry was written.
    pub fn finish(
        &mut self,
        file_name: &str,
        modified_at: DateTime<Utc>,
        succeeded: bool,
    ) -> Result<bool, RegistryError> {
        if succeeded || self.policy == RecordPolicy::Always {
            self.record(file_name, modified_at)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Called once at the start of every poll cycle. In `AlwaysReprocess` mode the entries
    /// are cleared even when the store fails to save the empty registry.
    pub fn begin_cycle(&mut self) -> Result<(), RegistryError> {
        if self.mode == RegistryMode::AlwaysReprocess && !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "clearing registry for new cycle");
            self.reset()?;
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), RegistryError> {
        self.entries.clear();
        self.store.save(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 9, 5, 0).unwrap()
    }

    #[test]
    fn gates_on_strictly_newer_modification_time() {
        let mut registry = ProcessedFileRegistry::default();
        assert!(registry.should_process("a.csv", t0()));

        registry.record("a.csv", t0()).unwrap();
        assert!(!registry.should_process("a.csv", t0()));
        assert!(!registry.should_process("a.csv", t0() - Duration::seconds(1)));
        assert!(registry.should_process("a.csv", t0() + Duration::seconds(1)));
        assert!(registry.should_process("b.csv", t0()));
    }

    #[test]
    fn strict_policy_ignores_failures() {
        let mut registry = ProcessedFileRegistry::in_memory(RegistryMode::Incremental, RecordPolicy::OnSuccess);
        assert!(!registry.finish("a.csv", t0(), false).unwrap());
        assert!(registry.get("a.csv").is_none());
        assert!(registry.finish("a.csv", t0(), true).unwrap());
        assert_eq!(registry.get("a.csv").unwrap().modified_at, t0());
    }

    #[test]
    fn lenient_policy_records_failures() {
        let mut registry = ProcessedFileRegistry::in_memory(RegistryMode::Incremental, RecordPolicy::Always);
        assert!(registry.finish("a.csv", t0(), false).unwrap());
        assert!(!registry.should_process("a.csv", t0()));
    }

    #[test]
    fn always_reprocess_mode_clears_each_cycle() {
        let mut registry =
            ProcessedFileRegistry::in_memory(RegistryMode::AlwaysReprocess, RecordPolicy::OnSuccess);
        registry.record("a.csv", t0()).unwrap();
        registry.begin_cycle().unwrap();
        assert!(registry.is_empty());
        assert!(registry.should_process("a.csv", t0()));

        let mut incremental = ProcessedFileRegistry::default();
        incremental.record("a.csv", t0()).unwrap();
        incremental.begin_cycle().unwrap();
        assert_eq!(incremental.len(), 1);
    }

    #[test]
    fn json_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/registry.json");
        let modified = t0() + Duration::nanoseconds(123_456_789);

        let mut registry = ProcessedFileRegistry::new(
            RegistryMode::Incremental,
            RecordPolicy::OnSuccess,
            Box::new(JsonFileStore::new(&path)),
        )
        .unwrap();
        registry.record("a.csv", modified).unwrap();

        let reloaded = ProcessedFileRegistry::new(
            RegistryMode::Incremental,
            RecordPolicy::OnSuccess,
            Box::new(JsonFileStore::new(&path)),
        )
        .unwrap();
        assert_eq!(reloaded.get("a.csv").unwrap().modified_at, modified);
        assert!(!reloaded.should_process("a.csv", modified));
    }

    #[test]
    fn corrupt_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }
}
