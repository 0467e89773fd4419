use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, Result};

/// Counter line emitted by the acquisition runtime.
pub const DEFAULT_SENTINEL: &str = "$RT_COUNT$";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub removed: usize,
}

/// Drops every line that contains one of the sentinel markers. Everything else, line
/// terminators included, is copied byte for byte.
#[derive(Debug, Clone)]
pub struct LineFilter {
    markers: Vec<Vec<u8>>,
}

impl Default for LineFilter {
    fn default() -> Self {
        Self::new([DEFAULT_SENTINEL])
    }
}

impl LineFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|marker| marker.as_ref().as_bytes().to_vec())
            .filter(|marker| !marker.is_empty())
            .collect();
        Self { markers }
    }

    pub fn is_marked(&self, line: &[u8]) -> bool {
        self.markers.iter().any(|marker| {
            line.len() >= marker.len() && line.windows(marker.len()).any(|w| w == marker.as_slice())
        })
    }

    /// Writes the filtered copy of `source` to `working`, replacing any previous copy.
    pub fn filter_file(&self, source: &Path, working: &Path) -> Result<FilterStats> {
        let read_err = |source_err: io::Error| PipelineError::Read {
            path: source.to_path_buf(),
            source: source_err,
        };
        let write_err = |source_err: io::Error| PipelineError::Write {
            path: working.to_path_buf(),
            source: source_err,
        };

        let mut reader = BufReader::new(File::open(source).map_err(read_err)?);
        let mut writer = BufWriter::new(File::create(working).map_err(write_err)?);

        let mut stats = FilterStats::default();
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).map_err(read_err)?;
            if read == 0 {
                break;
            }
            if self.is_marked(&line) {
                stats.removed += 1;
            } else {
                writer.write_all(&line).map_err(write_err)?;
                stats.kept += 1;
            }
        }
        writer.flush().map_err(write_err)?;

        debug!(
            source = %source.display(),
            working = %working.display(),
            kept = stats.kept,
            removed = stats.removed,
            "filtered sentinel lines"
        );
        Ok(stats)
    }
}
