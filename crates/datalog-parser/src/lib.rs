pub mod delimiter;
pub mod errors;
pub mod model;
mod normalizer;
pub mod timestamp;
pub mod values;

pub use delimiter::{sniff_delimiter, DelimiterChoice};
pub use errors::{NormalizeError, NormalizeWarning};
pub use model::{
    Cell, NormalizeOptions, Normalized, NormalizedTable, NUMERIC_COLUMNS, REQUIRED_COLUMNS,
    TIMESTAMP_COLUMN,
};
pub use normalizer::{normalize, write_csv};

#[cfg(test)]
mod tests;
