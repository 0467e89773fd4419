use std::borrow::Cow;

/// Rewrites decimal-comma notation (a comma with an ASCII digit on both sides) to a decimal
/// point. Other commas are left untouched.
pub fn rewrite_decimal_commas(value: &str) -> Cow<'_, str> {
    let bytes = value.as_bytes();
    let needs_rewrite = bytes
        .windows(3)
        .any(|w| w[1] == b',' && w[0].is_ascii_digit() && w[2].is_ascii_digit());
    if !needs_rewrite {
        return Cow::Borrowed(value);
    }

    let mut out = Vec::with_capacity(bytes.len());
    for (idx, byte) in bytes.iter().enumerate() {
        let is_decimal_comma = *byte == b','
            && idx > 0
            && bytes[idx - 1].is_ascii_digit()
            && bytes.get(idx + 1).is_some_and(u8::is_ascii_digit);
        out.push(if is_decimal_comma { b'.' } else { *byte });
    }
    // only ASCII bytes were replaced by ASCII bytes
    Cow::Owned(String::from_utf8(out).unwrap_or_else(|_| value.to_string()))
}

/// Result of coercing one cell of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Value(f64),
    /// Blank or NaN cell.
    Missing,
    /// Cell had content that is not a number.
    Invalid,
}

impl Coerced {
    pub fn value(self) -> Option<f64> {
        match self {
            Coerced::Value(value) => Some(value),
            Coerced::Missing | Coerced::Invalid => None,
        }
    }
}

pub fn coerce_numeric(value: &str) -> Coerced {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Coerced::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Coerced::Value(parsed),
        Ok(_) => Coerced::Missing,
        Err(_) => Coerced::Invalid,
    }
}

/// Shortest representation that reads back to the same value (`3.14`, `1`, `-0.5`).
pub fn format_numeric(value: f64) -> String {
    if value == 0.0 {
        // drop the sign of negative zero
        return "0".to_string();
    }
    value.to_string()
}
