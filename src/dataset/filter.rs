//! Row selection applied before grouping.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::cleaning::{parse_date_value, parse_plain};

use super::mapping::{cell, ColumnMapping, Row};

/// Keep rows whose `column` renders as one of `values`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalFilter {
    /// Column to compare.
    pub column: String,
    /// Accepted labels; empty accepts everything.
    pub values: Vec<String>,
}

/// Keep rows whose `column` parses to a number inside the range.
///
/// Both ends are inclusive; an open end is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    /// Column parsed as a plain number.
    pub column: String,
    /// Inclusive lower end.
    pub min: Option<f64>,
    /// Inclusive upper end.
    pub max: Option<f64>,
}

impl NumericRange {
    fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |lo| value >= lo) && self.max.map_or(true, |hi| value <= hi)
    }
}

/// Inclusive date window on the mapped date column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest accepted date, inclusive.
    pub start: Option<NaiveDateTime>,
    /// Latest accepted date, inclusive.
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    fn contains(&self, date: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Filters chosen in the dashboard sidebar.
///
/// An empty selection list means "everything". The lab and type selections
/// only apply when those roles are mapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowFilter {
    /// Elements to keep.
    pub selected_elements: Vec<String>,
    /// Labs to keep.
    pub selected_labs: Vec<String>,
    /// Sample types to keep.
    pub selected_types: Vec<String>,
    /// Label filters on arbitrary columns.
    pub categorical: Vec<CategoricalFilter>,
    /// Numeric range filters on arbitrary columns.
    pub numerical: Vec<NumericRange>,
    /// Date window on the mapped date column.
    pub date_range: Option<DateRange>,
}

fn selected(choices: &[String], row: &Row, column: Option<&str>) -> bool {
    match column {
        Some(c) if !choices.is_empty() => {
            let label = cell(row, c).as_label();
            choices.iter().any(|choice| *choice == label)
        }
        _ => true,
    }
}

impl RowFilter {
    /// Whether a single row survives every filter.
    ///
    /// Rows with an unparseable number under a numeric range, or an
    /// unparseable date under a date range, are dropped.
    pub fn matches(&self, row: &Row, mapping: &ColumnMapping) -> bool {
        if !selected(&self.selected_elements, row, mapping.element())
            || !selected(&self.selected_labs, row, mapping.lab())
            || !selected(&self.selected_types, row, mapping.sample_type())
        {
            return false;
        }

        let categorical_ok = self.categorical.iter().all(|f| {
            f.values.is_empty() || {
                let label = cell(row, &f.column).as_label();
                f.values.iter().any(|v| *v == label)
            }
        });
        if !categorical_ok {
            return false;
        }

        let numeric_ok = self.numerical.iter().all(|range| {
            parse_plain(cell(row, &range.column))
                .value()
                .is_some_and(|v| range.contains(v))
        });
        if !numeric_ok {
            return false;
        }

        match (&self.date_range, mapping.date()) {
            (Some(range), Some(column)) => {
                parse_date_value(cell(row, column)).is_some_and(|d| range.contains(d))
            }
            _ => true,
        }
    }

    /// Rows that survive, in input order.
    pub fn apply<'a>(&self, rows: &'a [Row], mapping: &ColumnMapping) -> Vec<&'a Row> {
        rows.iter().filter(|row| self.matches(row, mapping)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::RawValue;

    fn row(element: &str, lab: &str, grade: &str, date: &str) -> Row {
        let mut r = Row::new();
        r.insert("Element".into(), RawValue::from(element));
        r.insert("Lab".into(), RawValue::from(lab));
        r.insert("Grade".into(), RawValue::from(grade));
        r.insert("Date".into(), RawValue::from(date));
        r
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            element: Some("Element".into()),
            lab: Some("Lab".into()),
            value: Some("Grade".into()),
            date: Some("Date".into()),
            ..ColumnMapping::default()
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            row("Au", "ALS", "0.5", "2024-01-01"),
            row("Cu", "ALS", "1.5", "2024-02-01"),
            row("Au", "SGS", "2.5", "2024-03-01"),
            row("Au", "SGS", "n/a", "not a date"),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let rows = rows();
        assert_eq!(RowFilter::default().apply(&rows, &mapping()).len(), 4);
    }

    #[test]
    fn element_and_lab_selection() {
        let rows = rows();
        let f = RowFilter {
            selected_elements: vec!["Au".into()],
            selected_labs: vec!["SGS".into()],
            ..RowFilter::default()
        };
        assert_eq!(f.apply(&rows, &mapping()).len(), 2);
    }

    #[test]
    fn lab_selection_ignored_when_unmapped() {
        let rows = rows();
        let m = ColumnMapping {
            lab: None,
            ..mapping()
        };
        let f = RowFilter {
            selected_labs: vec!["nobody".into()],
            ..RowFilter::default()
        };
        assert_eq!(f.apply(&rows, &m).len(), 4);
    }

    #[test]
    fn numeric_range_is_inclusive_and_drops_text() {
        let rows = rows();
        let f = RowFilter {
            numerical: vec![NumericRange {
                column: "Grade".into(),
                min: Some(0.5),
                max: Some(1.5),
            }],
            ..RowFilter::default()
        };
        let kept = f.apply(&rows, &mapping());
        assert_eq!(kept.len(), 2);
        assert_eq!(cell(kept[1], "Element"), &RawValue::from("Cu"));
    }

    #[test]
    fn date_range_drops_unparseable_dates() {
        let rows = rows();
        let f = RowFilter {
            date_range: Some(DateRange {
                start: crate::cleaning::parse_date("2024-01-15"),
                end: None,
            }),
            ..RowFilter::default()
        };
        assert_eq!(f.apply(&rows, &mapping()).len(), 2);
    }

    #[test]
    fn categorical_on_any_column() {
        let rows = rows();
        let f = RowFilter {
            categorical: vec![CategoricalFilter {
                column: "Lab".into(),
                values: vec!["ALS".into()],
            }],
            ..RowFilter::default()
        };
        assert_eq!(f.apply(&rows, &mapping()).len(), 2);
    }

    #[test]
    fn filter_from_json() {
        let f: RowFilter = serde_json::from_str(
            r#"{
                "selectedElements": ["Au"],
                "numerical": [{"column": "Grade", "min": 1.0, "max": null}]
            }"#,
        )
        .expect("parse");
        assert_eq!(f.selected_elements, vec!["Au".to_string()]);
        assert_eq!(f.numerical[0].min, Some(1.0));
        assert!(f.date_range.is_none());
    }
}
