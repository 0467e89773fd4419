use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Order matters: unambiguous year-first layouts, then day-first, then month-first for
// values such as `1/31/2024` that cannot be day-first. Two-digit years come after the
// four-digit layout of the same family.
static DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M:%S%.f %p",
    "%d/%m/%Y %I:%M %p",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d/%m/%y %H:%M:%S%.f",
    "%d/%m/%y %H:%M",
    "%d/%m/%y %I:%M:%S%.f %p",
    "%d/%m/%y %I:%M %p",
    "%d.%m.%y %H:%M:%S%.f",
    "%d.%m.%y %H:%M",
    "%d-%m-%y %H:%M:%S%.f",
    "%d-%m-%y %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S%.f %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%y %H:%M:%S%.f",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M:%S%.f %p",
    "%m/%d/%y %I:%M %p",
];

static DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%d/%m/%y", "%d.%m.%y",
    "%d-%m-%y", "%m/%d/%Y", "%m/%d/%y",
];

/// Parses a date/time cell, preferring day-first when the layout is ambiguous.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            if accepts_year(trimmed, fmt, dt.year()) {
                return Some(dt);
            }
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            if accepts_year(trimmed, fmt, date.year()) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
    }
    None
}

/// Rewrites a timestamp into `YYYY-MM-DD HH:MM:SS`, or `None` when it cannot be parsed.
pub fn canonicalize_timestamp(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.format(CANONICAL_FORMAT).to_string())
}

/// chrono's `%Y` also takes one to three digits; a `%Y` layout only counts when the year
/// was written out in full.
fn accepts_year(text: &str, fmt: &str, year: i32) -> bool {
    if !fmt.contains("%Y") {
        return true;
    }
    let expected = format!("{year:04}");
    text.split(|c: char| !c.is_ascii_digit())
        .any(|run| run == expected)
}
