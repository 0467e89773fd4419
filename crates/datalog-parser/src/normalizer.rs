use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use crate::errors::{NormalizeError, NormalizeWarning};
use crate::model::{
    Cell, NormalizeOptions, Normalized, NormalizedTable, NUMERIC_COLUMNS, REQUIRED_COLUMNS,
    TIMESTAMP_COLUMN,
};
use crate::timestamp::canonicalize_timestamp;
use crate::values::{coerce_numeric, rewrite_decimal_commas, Coerced};

#[derive(Debug, Clone, Copy)]
enum ColumnRole {
    Numeric,
    Timestamp,
    Passthrough,
}

fn classify_column(header: &str) -> ColumnRole {
    let trimmed = header.trim();
    if NUMERIC_COLUMNS.contains(&trimmed) {
        ColumnRole::Numeric
    } else if trimmed == TIMESTAMP_COLUMN {
        ColumnRole::Timestamp
    } else {
        ColumnRole::Passthrough
    }
}

/// Parses delimited content and applies the schema gate, decimal-comma rewrite, numeric
/// coercion and timestamp canonicalization. Nothing is returned unless the whole file
/// parsed, so callers never write partial output.
pub fn normalize(content: &[u8], options: &NormalizeOptions) -> Result<Normalized, NormalizeError> {
    let delimiter = options.delimiter.resolve(content);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(content);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(NormalizeError::Empty);
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h.trim() == **required))
        .map(|required| required.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(NormalizeError::MissingColumns { missing });
    }

    let roles: Vec<ColumnRole> = headers.iter().map(|h| classify_column(h)).collect();

    let records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, csv::Error>>()?;
    // the csv reader runs an open quote to end of input and folds later rows into it
    if let Some(line) = unterminated_quote(content, delimiter) {
        return Err(NormalizeError::UnterminatedQuote { line });
    }

    let mut rows = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for (row_idx, record) in records.iter().enumerate() {
        // header occupies line 1
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(row_idx as u64 + 2);

        let mut cells = Vec::with_capacity(roles.len());
        for (idx, role) in roles.iter().enumerate() {
            let raw = record.get(idx).unwrap_or_default();
            let value = rewrite_decimal_commas(raw);
            let cell = match role {
                ColumnRole::Numeric => match coerce_numeric(&value) {
                    Coerced::Invalid => {
                        warnings.push(NormalizeWarning::NumericCoercion {
                            line,
                            column: headers[idx].clone(),
                            value: raw.to_string(),
                        });
                        Cell::Number(None)
                    }
                    coerced => Cell::Number(coerced.value()),
                },
                ColumnRole::Timestamp => {
                    if value.trim().is_empty() {
                        Cell::Text(value.into_owned())
                    } else {
                        match canonicalize_timestamp(&value) {
                            Some(canonical) => Cell::Text(canonical),
                            None => {
                                warnings.push(NormalizeWarning::TimestampParse {
                                    line,
                                    value: value.to_string(),
                                });
                                Cell::Text(value.into_owned())
                            }
                        }
                    }
                }
                ColumnRole::Passthrough => Cell::Text(value.into_owned()),
            };
            cells.push(cell);
        }
        rows.push(cells);
    }

    Ok(Normalized {
        table: NormalizedTable {
            input_delimiter: delimiter,
            headers,
            rows,
        },
        warnings,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Line on which a quoted field opens without ever being closed, following the csv
/// reader's rules: a quote only opens a field at its start and `""` is an escaped quote.
fn unterminated_quote(content: &[u8], delimiter: u8) -> Option<u64> {
    let mut state = QuoteState::FieldStart;
    let mut line = 1u64;
    let mut opened_on = line;

    for &byte in content {
        state = match (state, byte) {
            (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, b'"') => QuoteState::Quoted,
            (QuoteState::FieldStart, b'"') => {
                opened_on = line;
                QuoteState::Quoted
            }
            (_, b'\n') => QuoteState::FieldStart,
            (_, b) if b == delimiter => QuoteState::FieldStart,
            _ => QuoteState::Unquoted,
        };
        if byte == b'\n' {
            line += 1;
        }
    }

    (state == QuoteState::Quoted).then_some(opened_on)
}

/// Serializes the table with every field quoted, header first.
pub fn write_csv(table: &NormalizedTable, delimiter: u8) -> Result<Vec<u8>, NormalizeError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::render))?;
    }

    writer
        .into_inner()
        .map_err(|err| NormalizeError::Serialize {
            message: err.to_string(),
        })
}
