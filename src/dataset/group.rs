//! Partitioning rows into analysis groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cleaning::parse_date_value;

use super::mapping::{cell, label_or, ColumnMapping, Row};

/// Lab label for rows when no lab column is mapped.
pub const DEFAULT_LAB: &str = "Default Lab";
/// Sample-type label for rows when no type column is mapped.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Element × lab × sample type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    /// Element label.
    pub element: String,
    /// Lab label, or [`DEFAULT_LAB`].
    pub lab: String,
    /// Sample type label, or [`UNKNOWN_TYPE`].
    #[serde(rename = "type")]
    pub sample_type: String,
}

impl GroupKey {
    /// Key of one row. `element_column` must be mapped by the caller.
    pub fn of(row: &Row, element_column: &str, mapping: &ColumnMapping) -> Self {
        Self {
            element: cell(row, element_column).as_label(),
            lab: label_or(row, mapping.lab(), DEFAULT_LAB),
            sample_type: label_or(row, mapping.sample_type(), UNKNOWN_TYPE),
        }
    }
}

/// Groups rows by `key`, preserving row order inside each group.
///
/// Groups iterate in key order, so output is deterministic.
pub fn group_rows_by<'a, K, F>(rows: &[&'a Row], mut key: F) -> BTreeMap<K, Vec<&'a Row>>
where
    K: Ord,
    F: FnMut(&Row) -> K,
{
    let mut groups: BTreeMap<K, Vec<&'a Row>> = BTreeMap::new();
    for &row in rows {
        groups.entry(key(row)).or_default().push(row);
    }
    groups
}

/// Sort key for a row's date: epoch milliseconds, `0` when unparseable.
fn date_millis(row: &Row, column: &str) -> i64 {
    parse_date_value(cell(row, column))
        .map(|d| d.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Stable ascending sort by the date column; rows with an unparseable date
/// sort as the Unix epoch.
pub fn sort_by_date(rows: &mut [&Row], date_column: &str) {
    rows.sort_by_cached_key(|row| date_millis(row, date_column));
}
