//! Conversion of raw cell values into numbers and dates.
//!
//! Assay exports mix numbers with strings such as `"<0.01"` (below detection),
//! `">500"` (over range) or `"1,250"`. Every analyzer consumes the result of
//! [`clean_value`] so that parsing happens in exactly one place.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A cell as delivered by the CSV layer.
///
/// Deserializes from a JSON number, string or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl RawValue {
    /// String form used for categorical comparisons and grouping.
    ///
    /// Missing cells compare as the empty string.
    pub fn as_label(&self) -> String {
        match self {
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
            RawValue::Missing => String::new(),
        }
    }

    /// Shorthand for `clean_value(self)`.
    pub fn reading(&self) -> Reading {
        clean_value(self)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

/// Outcome of numeric cleaning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Valid(f64),
    Invalid,
}

impl Reading {
    /// The value, or `NaN` for [`Reading::Invalid`].
    ///
    /// This is the form the analyzers take: `NaN` marks "no data" and keeps
    /// positions aligned with the source rows.
    pub fn or_nan(self) -> f64 {
        match self {
            Reading::Valid(v) => v,
            Reading::Invalid => f64::NAN,
        }
    }

    /// The number, or `None` when invalid.
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Valid(v) => Some(v),
            Reading::Invalid => None,
        }
    }

    /// Whether the cell held a usable number.
    pub fn is_valid(self) -> bool {
        matches!(self, Reading::Valid(_))
    }
}

/// Cleans one cell into a [`Reading`].
///
/// Numbers pass through unless they are non-finite. Text is trimmed, the
/// comparison prefixes `<` and `>` and thousands separators are removed, and
/// the rest is parsed as `f64`. Empty or unparseable text is invalid.
///
/// # Examples
///
/// ```
/// use qaqc_analytics::cleaning::{clean_value, RawValue, Reading};
///
/// assert_eq!(clean_value(&RawValue::from("<0.01")), Reading::Valid(0.01));
/// assert_eq!(clean_value(&RawValue::from("1,250")), Reading::Valid(1250.0));
/// assert_eq!(clean_value(&RawValue::from("n/a")), Reading::Invalid);
/// assert_eq!(clean_value(&RawValue::Missing), Reading::Invalid);
/// ```
pub fn clean_value(raw: &RawValue) -> Reading {
    match raw {
        RawValue::Number(n) if n.is_finite() => Reading::Valid(*n),
        RawValue::Number(_) | RawValue::Missing => Reading::Invalid,
        RawValue::Text(s) => parse_measurement(s),
    }
}

/// Parses a measurement string, stripping `<`, `>` and `,`.
pub fn parse_measurement(text: &str) -> Reading {
    let stripped: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ','))
        .collect();
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return Reading::Invalid;
    }
    match stripped.parse::<f64>() {
        Ok(v) if v.is_finite() => Reading::Valid(v),
        _ => Reading::Invalid,
    }
}

/// Parses a cell that must hold a plain number, without prefix stripping.
///
/// Used for the expected-value and standard-deviation columns, where a
/// `<` prefix signals a data-entry problem rather than a detection limit.
pub fn parse_plain(raw: &RawValue) -> Reading {
    match raw {
        RawValue::Number(n) if n.is_finite() => Reading::Valid(*n),
        RawValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Reading::Valid(v),
            _ => Reading::Invalid,
        },
        _ => Reading::Invalid,
    }
}

/// Drops `NaN` and infinite values.
pub fn clean_numeric(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parses a sample date.
///
/// Accepts RFC 3339 timestamps (converted to UTC), ISO date-times with or
/// without seconds, and bare dates (taken as midnight).
///
/// # Examples
///
/// ```
/// use qaqc_analytics::cleaning::parse_date;
///
/// let d = parse_date("2024-03-05").unwrap();
/// assert_eq!(d.to_string(), "2024-03-05 00:00:00");
/// assert!(parse_date("not a date").is_none());
/// ```
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parses a date cell; numbers are not dates.
pub fn parse_date_value(raw: &RawValue) -> Option<NaiveDateTime> {
    match raw {
        RawValue::Text(s) => parse_date(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comparison_prefixes() {
        assert_eq!(parse_measurement("<0.005"), Reading::Valid(0.005));
        assert_eq!(parse_measurement(">500"), Reading::Valid(500.0));
        assert_eq!(parse_measurement("  12.5 "), Reading::Valid(12.5));
        assert_eq!(parse_measurement("< 0.01"), Reading::Valid(0.01));
    }

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_measurement("1,234,567.5"), Reading::Valid(1_234_567.5));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_measurement(""), Reading::Invalid);
        assert_eq!(parse_measurement("<"), Reading::Invalid);
        assert_eq!(parse_measurement("abc"), Reading::Invalid);
        assert_eq!(parse_measurement("NaN"), Reading::Invalid);
        assert_eq!(parse_measurement("inf"), Reading::Invalid);
    }

    #[test]
    fn numbers_pass_through() {
        assert_eq!(clean_value(&RawValue::Number(3.5)), Reading::Valid(3.5));
        assert_eq!(clean_value(&RawValue::Number(f64::NAN)), Reading::Invalid);
    }

    #[test]
    fn plain_parse_keeps_prefix_invalid() {
        assert_eq!(parse_plain(&RawValue::from("<2")), Reading::Invalid);
        assert_eq!(parse_plain(&RawValue::from(" 2.5")), Reading::Valid(2.5));
        assert_eq!(parse_plain(&RawValue::Missing), Reading::Invalid);
    }

    #[test]
    fn reading_accessors() {
        assert_eq!(Reading::Valid(1.0).value(), Some(1.0));
        assert!(Reading::Invalid.or_nan().is_nan());
        assert!(!Reading::Invalid.is_valid());
    }

    #[test]
    fn clean_numeric_drops_nan() {
        assert_eq!(
            clean_numeric(&[1.0, f64::NAN, 2.0, f64::INFINITY]),
            vec![1.0, 2.0]
        );
    }

    #[test]
    fn raw_value_from_json() {
        let cells: Vec<RawValue> =
            serde_json::from_str(r#"[1.5, "<0.01", null]"#).expect("valid json");
        assert_eq!(cells[0], RawValue::Number(1.5));
        assert_eq!(cells[1], RawValue::Text("<0.01".into()));
        assert_eq!(cells[2], RawValue::Missing);
    }

    #[test]
    fn labels() {
        assert_eq!(RawValue::from("Au").as_label(), "Au");
        assert_eq!(RawValue::Number(2.0).as_label(), "2");
        assert_eq!(RawValue::Missing.as_label(), "");
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("15/01/2024"), Some(expected));
        assert_eq!(parse_date("2024/01/15"), Some(expected));
        assert_eq!(parse_date("2024-01-15T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2024-01-15 00:00:00"), Some(expected));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date_value(&RawValue::Number(20240115.0)), None);
    }
}
