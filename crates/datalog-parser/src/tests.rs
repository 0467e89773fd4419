use crate::delimiter::{parse_single_delimiter, DelimiterChoice};
use crate::errors::{NormalizeError, NormalizeWarning};
use crate::model::{Cell, NormalizeOptions};
use crate::timestamp::canonicalize_timestamp;
use crate::values::{coerce_numeric, format_numeric, rewrite_decimal_commas, Coerced};
use crate::{normalize, sniff_delimiter, write_csv};

const WINCC_EXPORT: &str = "\
VarName;TimeString;VarValue;Validity;Time_ms
\"Temp\";\"31.01.2024 09:05:00\";\"3,14\";1;45322,3785532407
\"Temp\";\"31.01.2024 09:06:00\";\"2,5\";1;45322,3792476852
";

fn semicolon_options() -> NormalizeOptions {
    NormalizeOptions {
        delimiter: DelimiterChoice::Fixed(b';'),
        output_delimiter: b',',
    }
}

#[test]
fn sniffs_semicolon_despite_decimal_commas() {
    assert_eq!(sniff_delimiter(WINCC_EXPORT.as_bytes()), b';');
}

#[test]
fn sniffs_tab_and_comma() {
    assert_eq!(sniff_delimiter(b"a\tb\tc\n1\t2\t3\n"), b'\t');
    assert_eq!(sniff_delimiter(b"a,b,c\n1,2,3\n"), b',');
}

#[test]
fn sniff_ignores_delimiters_inside_quotes() {
    let content = b"name;value\n\"a;b\";1\n\"c\";2\n";
    assert_eq!(sniff_delimiter(content), b';');
}

#[test]
fn sniff_falls_back_to_comma_when_ambiguous() {
    // one comma and one semicolon on every line
    assert_eq!(sniff_delimiter(b"a,b;c\n1,2;3\n"), b',');
    assert_eq!(sniff_delimiter(b"single column\nvalue\n"), b',');
    assert_eq!(sniff_delimiter(b""), b',');
}

#[test]
fn sniff_only_inspects_leading_sample() {
    let mut content = String::from("a;b\n");
    while content.len() < 2048 {
        content.push_str("1;2\n");
    }
    // rows past the sample would make semicolon inconsistent
    content.push_str("1;2;3;4\n");
    assert_eq!(sniff_delimiter(content.as_bytes()), b';');
}

#[test]
fn sniff_is_deterministic() {
    let first = sniff_delimiter(WINCC_EXPORT.as_bytes());
    for _ in 0..5 {
        assert_eq!(sniff_delimiter(WINCC_EXPORT.as_bytes()), first);
    }
}

#[test]
fn delimiter_choice_parses_config_values() {
    assert_eq!(DelimiterChoice::try_from("auto"), Ok(DelimiterChoice::Auto));
    assert_eq!(DelimiterChoice::try_from(";"), Ok(DelimiterChoice::Fixed(b';')));
    assert_eq!(DelimiterChoice::try_from("\\t"), Ok(DelimiterChoice::Fixed(b'\t')));
    assert!(parse_single_delimiter(";;").is_err());
    assert!(parse_single_delimiter("\"").is_err());
    assert!(parse_single_delimiter("").is_err());
}

#[test]
fn rewrites_only_decimal_commas() {
    assert_eq!(rewrite_decimal_commas("3,14"), "3.14");
    assert_eq!(rewrite_decimal_commas("-0,5"), "-0.5");
    assert_eq!(rewrite_decimal_commas("Motor, left"), "Motor, left");
    assert_eq!(rewrite_decimal_commas("09:05:00,250"), "09:05:00.250");
    assert_eq!(rewrite_decimal_commas("1,"), "1,");
}

#[test]
fn numeric_coercion_marks_missing_values() {
    assert_eq!(coerce_numeric("3.14"), Coerced::Value(3.14));
    assert_eq!(coerce_numeric(" 12 "), Coerced::Value(12.0));
    assert_eq!(coerce_numeric(""), Coerced::Missing);
    assert_eq!(coerce_numeric("NaN"), Coerced::Missing);
    assert_eq!(coerce_numeric("n/a"), Coerced::Invalid);
    assert_eq!(format_numeric(1.0), "1");
    assert_eq!(format_numeric(3.14), "3.14");
    assert_eq!(format_numeric(-0.0), "0");
}

#[test]
fn canonicalizes_day_first_timestamps() {
    assert_eq!(
        canonicalize_timestamp("31/01/2024 09:05").as_deref(),
        Some("2024-01-31 09:05:00")
    );
    assert_eq!(
        canonicalize_timestamp("01/02/2024 13:00:00").as_deref(),
        Some("2024-02-01 13:00:00")
    );
    assert_eq!(
        canonicalize_timestamp("31.01.2024 09:05:00.250").as_deref(),
        Some("2024-01-31 09:05:00")
    );
    assert_eq!(
        canonicalize_timestamp("2024-01-31T09:05:00Z").as_deref(),
        Some("2024-01-31 09:05:00")
    );
    assert_eq!(
        canonicalize_timestamp("31/01/2024").as_deref(),
        Some("2024-01-31 00:00:00")
    );
}

#[test]
fn falls_back_to_month_first_when_day_first_is_impossible() {
    assert_eq!(
        canonicalize_timestamp("1/31/2024 9:05:00 PM").as_deref(),
        Some("2024-01-31 21:05:00")
    );
    assert_eq!(canonicalize_timestamp("not a date"), None);
}

#[test]
fn two_digit_years_stay_day_first() {
    assert_eq!(
        canonicalize_timestamp("31/01/24 09:05").as_deref(),
        Some("2024-01-31 09:05:00")
    );
    assert_eq!(
        canonicalize_timestamp("31.01.24 09:05:30").as_deref(),
        Some("2024-01-31 09:05:30")
    );
    assert_eq!(
        canonicalize_timestamp("05-02-24 23:59").as_deref(),
        Some("2024-02-05 23:59:00")
    );
    assert_eq!(
        canonicalize_timestamp("1/31/24 9:05 PM").as_deref(),
        Some("2024-01-31 21:05:00")
    );
    assert_eq!(
        canonicalize_timestamp("31/01/24").as_deref(),
        Some("2024-01-31 00:00:00")
    );
}

#[test]
fn short_years_never_match_four_digit_layouts() {
    assert_eq!(canonicalize_timestamp("24/01/31 09:05").as_deref(), Some("2031-01-24 09:05:00"));
    assert_eq!(canonicalize_timestamp("31/01/024 09:05"), None);
}

#[test]
fn normalizes_wincc_export() {
    let normalized = normalize(WINCC_EXPORT.as_bytes(), &NormalizeOptions::default())
        .expect("normalize failed");
    let table = &normalized.table;

    assert!(normalized.warnings.is_empty());
    assert_eq!(table.input_delimiter, b';');
    assert_eq!(table.height(), 2);
    assert_eq!(table.cell(0, "VarValue"), Some(&Cell::Number(Some(3.14))));
    assert_eq!(table.cell(1, "VarValue"), Some(&Cell::Number(Some(2.5))));
    assert_eq!(table.cell(0, "Validity"), Some(&Cell::Number(Some(1.0))));
    assert_eq!(
        table.cell(0, "TimeString").and_then(Cell::as_text),
        Some("2024-01-31 09:05:00")
    );
    assert_eq!(table.cell(0, "VarName").and_then(Cell::as_text), Some("Temp"));
}

#[test]
fn writes_every_field_quoted_in_input_order() {
    let normalized = normalize(WINCC_EXPORT.as_bytes(), &semicolon_options()).unwrap();
    let bytes = write_csv(&normalized.table, b',').unwrap();
    let expected = "\
\"VarName\",\"TimeString\",\"VarValue\",\"Validity\",\"Time_ms\"
\"Temp\",\"2024-01-31 09:05:00\",\"3.14\",\"1\",\"45322.3785532407\"
\"Temp\",\"2024-01-31 09:06:00\",\"2.5\",\"1\",\"45322.3792476852\"
";
    assert_eq!(String::from_utf8(bytes).unwrap(), expected);
}

#[test]
fn output_delimiter_is_configurable() {
    let normalized = normalize(WINCC_EXPORT.as_bytes(), &semicolon_options()).unwrap();
    let bytes = write_csv(&normalized.table, b';').unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("\"VarName\";\"TimeString\";\"VarValue\""));
}

#[test]
fn normalization_is_idempotent() {
    let options = NormalizeOptions::default();
    let first = write_csv(&normalize(WINCC_EXPORT.as_bytes(), &options).unwrap().table, b',');
    let second = write_csv(&normalize(WINCC_EXPORT.as_bytes(), &options).unwrap().table, b',');
    assert_eq!(first.unwrap(), second.unwrap());
}

#[test]
fn missing_required_columns_are_reported() {
    let content = "VarName;TimeString;VarValue\nTemp;31.01.2024 09:05:00;1\n";
    let err = normalize(content.as_bytes(), &semicolon_options()).unwrap_err();
    match err {
        NormalizeError::MissingColumns { missing } => {
            assert_eq!(missing, vec!["Time_ms".to_string(), "Validity".to_string()]);
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn inconsistent_column_counts_are_parse_errors() {
    let content = "VarValue;Time_ms;Validity;TimeString\n1;2;3;31/01/2024 09:05\n1;2\n";
    let err = normalize(content.as_bytes(), &semicolon_options()).unwrap_err();
    assert!(matches!(err, NormalizeError::Csv { .. }), "got {err:?}");
}

#[test]
fn unclosed_quote_is_a_parse_error() {
    let content = "VarValue;Time_ms;Validity;TimeString\n1;2;3;\"31/01/2024 09:05\n4;5;6;01/02/2024 10:00\n";
    let err = normalize(content.as_bytes(), &semicolon_options()).unwrap_err();
    assert!(
        matches!(err, NormalizeError::UnterminatedQuote { line: 2 }),
        "got {err:?}"
    );
}

#[test]
fn quoted_fields_may_span_lines_and_escape_quotes() {
    let content = "VarValue;Time_ms;Validity;TimeString;Comment\n1;2;3;31/01/2024 09:05;\"say \"\"hi\"\"\nthere\"\n";
    let normalized = normalize(content.as_bytes(), &semicolon_options()).unwrap();
    let table = &normalized.table;
    assert_eq!(table.height(), 1);
    assert_eq!(
        table.cell(0, "Comment").and_then(Cell::as_text),
        Some("say \"hi\"\nthere")
    );
}

#[test]
fn empty_input_is_rejected() {
    let err = normalize(b"", &NormalizeOptions::default()).unwrap_err();
    assert!(matches!(err, NormalizeError::Empty));
}

#[test]
fn header_only_file_produces_header_only_output() {
    let content = "VarValue;Time_ms;Validity;TimeString\n";
    let normalized = normalize(content.as_bytes(), &semicolon_options()).unwrap();
    assert_eq!(normalized.table.height(), 0);
    let bytes = write_csv(&normalized.table, b',').unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "\"VarValue\",\"Time_ms\",\"Validity\",\"TimeString\"\n"
    );
}

#[test]
fn bad_cells_become_warnings_not_failures() {
    let content = "\
VarValue;Time_ms;Validity;TimeString;Comment
abc;10;1;yesterday;Motor, left
";
    let normalized = normalize(content.as_bytes(), &semicolon_options()).unwrap();
    let table = &normalized.table;

    assert!(table.cell(0, "VarValue").unwrap().is_missing());
    assert_eq!(table.cell(0, "Time_ms"), Some(&Cell::Number(Some(10.0))));
    assert_eq!(table.cell(0, "TimeString").and_then(Cell::as_text), Some("yesterday"));
    assert_eq!(table.cell(0, "Comment").and_then(Cell::as_text), Some("Motor, left"));

    assert_eq!(
        normalized.warnings,
        vec![
            NormalizeWarning::NumericCoercion {
                line: 2,
                column: "VarValue".to_string(),
                value: "abc".to_string(),
            },
            NormalizeWarning::TimestampParse {
                line: 2,
                value: "yesterday".to_string(),
            },
        ]
    );
    assert!(normalized.warnings.iter().all(|warning| warning.line() == 2));

    let bytes = write_csv(table, b',').unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.ends_with("\"\",\"10\",\"1\",\"yesterday\",\"Motor, left\"\n"));
}
