use std::fs;
use std::io;
use std::path::Path;

use datalog_parser::{normalize, write_csv, NormalizeError, NormalizeOptions};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub rows: usize,
    pub input_delimiter: u8,
    pub warnings: usize,
}

/// Normalizes a working file and writes the cleaned copy to `destination`.
///
/// The destination is only touched once the whole table has been parsed and serialized,
/// so a failure never leaves partial output behind. Cell-level problems are logged and
/// counted in the summary.
pub fn normalize_file(
    working: &Path,
    destination: &Path,
    options: &NormalizeOptions,
) -> Result<NormalizeSummary> {
    let content = fs::read(working).map_err(|source| PipelineError::Read {
        path: working.to_path_buf(),
        source,
    })?;

    let normalized = normalize(&content, options).map_err(|err| match err {
        NormalizeError::MissingColumns { missing } => PipelineError::MissingColumns {
            path: working.to_path_buf(),
            missing,
        },
        other => PipelineError::Parse {
            path: working.to_path_buf(),
            source: other,
        },
    })?;

    debug!(
        path = %working.display(),
        delimiter = %(normalized.table.input_delimiter as char).escape_default(),
        rows = normalized.table.height(),
        "parsed working file"
    );
    for warning in &normalized.warnings {
        warn!(
            path = %working.display(),
            line = warning.line(),
            %warning,
            "cell normalization warning"
        );
    }

    let bytes = write_csv(&normalized.table, options.output_delimiter).map_err(|err| {
        PipelineError::Write {
            path: destination.to_path_buf(),
            source: io::Error::other(err.to_string()),
        }
    })?;
    fs::write(destination, bytes).map_err(|source| PipelineError::Write {
        path: destination.to_path_buf(),
        source,
    })?;

    Ok(NormalizeSummary {
        rows: normalized.table.height(),
        input_delimiter: normalized.table.input_delimiter,
        warnings: normalized.warnings.len(),
    })
}
