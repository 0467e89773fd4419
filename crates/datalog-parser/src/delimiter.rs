use std::fmt;

use serde::{Deserialize, Deserializer};

/// Number of leading bytes inspected when sniffing.
pub const SAMPLE_LEN: usize = 1024;

const CANDIDATES: [u8; 3] = [b',', b';', b'\t'];
const FALLBACK: u8 = b',';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelimiterChoice {
    #[default]
    Auto,
    Fixed(u8),
}

impl DelimiterChoice {
    pub fn resolve(&self, content: &[u8]) -> u8 {
        match self {
            DelimiterChoice::Auto => sniff_delimiter(content),
            DelimiterChoice::Fixed(byte) => *byte,
        }
    }
}

impl fmt::Display for DelimiterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelimiterChoice::Auto => f.write_str("auto"),
            DelimiterChoice::Fixed(b'\t') => f.write_str("\\t"),
            DelimiterChoice::Fixed(byte) => write!(f, "{}", *byte as char),
        }
    }
}

impl TryFrom<&str> for DelimiterChoice {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("auto") {
            return Ok(DelimiterChoice::Auto);
        }
        parse_single_delimiter(value).map(DelimiterChoice::Fixed)
    }
}

impl<'de> Deserialize<'de> for DelimiterChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DelimiterChoice::try_from(raw.as_str()).map_err(serde::de::Error::custom)
    }
}

/// Accepts a single ASCII character (or the escape `\t`) usable as a field separator.
pub fn parse_single_delimiter(value: &str) -> Result<u8, String> {
    if value == "\\t" {
        return Ok(b'\t');
    }
    let bytes = value.as_bytes();
    if bytes.len() != 1 || !bytes[0].is_ascii() {
        return Err(format!(
            "delimiter must be a single ASCII character, got '{value}'"
        ));
    }
    match bytes[0] {
        b'"' | b'\n' | b'\r' => Err(format!("'{}' cannot be used as a delimiter", value.escape_default())),
        byte => Ok(byte),
    }
}

/// Picks the field separator among comma, semicolon and tab.
///
/// A candidate is plausible when it appears the same non-zero number of times (outside
/// double quotes) on every complete line of the sample. The most frequent plausible
/// candidate wins; no plausible candidate, or a tie, falls back to comma.
pub fn sniff_delimiter(content: &[u8]) -> u8 {
    let truncated = content.len() > SAMPLE_LEN;
    let sample = &content[..content.len().min(SAMPLE_LEN)];

    let mut lines: Vec<&[u8]> = sample
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect();
    if truncated && lines.len() > 1 {
        // last line was cut by the sample boundary
        lines.pop();
    }
    lines.retain(|line| !line.iter().all(u8::is_ascii_whitespace));

    if lines.is_empty() {
        return FALLBACK;
    }

    let mut best: Option<(u8, usize)> = None;
    let mut tied = false;
    for candidate in CANDIDATES {
        let Some(count) = consistent_count(&lines, candidate) else {
            continue;
        };
        match best {
            Some((_, best_count)) if count == best_count => tied = true,
            Some((_, best_count)) if count < best_count => {}
            _ => {
                best = Some((candidate, count));
                tied = false;
            }
        }
    }

    match best {
        Some((candidate, _)) if !tied => candidate,
        _ => FALLBACK,
    }
}

fn consistent_count(lines: &[&[u8]], candidate: u8) -> Option<usize> {
    let first = count_unquoted(lines[0], candidate);
    if first == 0 {
        return None;
    }
    lines[1..]
        .iter()
        .all(|line| count_unquoted(line, candidate) == first)
        .then_some(first)
}

fn count_unquoted(line: &[u8], candidate: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line {
        match *byte {
            b'"' => in_quotes = !in_quotes,
            b if b == candidate && !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}
