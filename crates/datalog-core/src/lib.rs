pub mod config;
pub mod error;
pub mod line_filter;
pub mod logging;
pub mod normalize;
pub mod poller;
pub mod registry;
pub mod selection;

pub use config::{Config, ConfigError};
pub use error::{PipelineError, Result};
pub use line_filter::{FilterStats, LineFilter};
pub use normalize::{normalize_file, NormalizeSummary};
pub use poller::{BoundedTicker, CycleReport, IntervalTicker, Poller, Ticker};
pub use registry::{
    InMemoryStore, JsonFileStore, ProcessedFileRecord, ProcessedFileRegistry, RecordPolicy,
    RegistryError, RegistryMode, RegistryStore,
};
pub use selection::FileSelection;
