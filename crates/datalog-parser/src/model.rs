use crate::delimiter::DelimiterChoice;
use crate::errors::NormalizeWarning;
use crate::values::format_numeric;

pub const TIMESTAMP_COLUMN: &str = "TimeString";
pub const NUMERIC_COLUMNS: [&str; 3] = ["VarValue", "Time_ms", "Validity"];
pub const REQUIRED_COLUMNS: [&str; 4] = ["VarValue", "Time_ms", "Validity", TIMESTAMP_COLUMN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub delimiter: DelimiterChoice,
    pub output_delimiter: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            delimiter: DelimiterChoice::Auto,
            output_delimiter: b',',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// Coerced numeric cell; `None` is the missing marker.
    Number(Option<f64>),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            Cell::Number(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Number(None))
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Text(value) => value.clone(),
            Cell::Number(Some(value)) => format_numeric(*value),
            Cell::Number(None) => String::new(),
        }
    }
}

/// Parsed and normalized table, column and row order preserved from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub input_delimiter: u8,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl NormalizedTable {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.trim() == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: NormalizedTable,
    pub warnings: Vec<NormalizeWarning>,
}
