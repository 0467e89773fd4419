use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("file did not contain a header row")]
    Empty,

    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("quoted field opened on line {line} is never closed")]
    UnterminatedQuote { line: u64 },

    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("failed to serialize normalized table: {message}")]
    Serialize { message: String },
}

impl From<csv::Error> for NormalizeError {
    fn from(source: csv::Error) -> Self {
        NormalizeError::Csv { source }
    }
}

/// Per-cell condition that does not stop the file from being written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    NumericCoercion {
        line: u64,
        column: String,
        value: String,
    },
    TimestampParse {
        line: u64,
        value: String,
    },
}

impl NormalizeWarning {
    pub fn line(&self) -> u64 {
        match self {
            NormalizeWarning::NumericCoercion { line, .. } => *line,
            NormalizeWarning::TimestampParse { line, .. } => *line,
        }
    }
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeWarning::NumericCoercion {
                line,
                column,
                value,
            } => write!(
                f,
                "line {line}: value '{value}' in column '{column}' is not numeric, treated as missing"
            ),
            NormalizeWarning::TimestampParse { line, value } => {
                write!(f, "line {line}: could not parse timestamp '{value}', kept as-is")
            }
        }
    }
}
