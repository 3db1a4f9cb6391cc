//! From parsed CSV rows to per-group analyzer results.
//!
//! The analyzers work on plain `f64` series. This module bridges the gap from
//! a table of loosely typed cells: a [`ColumnMapping`] says which column plays
//! which role, a [`RowFilter`] narrows the rows, and the runners group what is
//! left and call the matching analyzer once per group.
//!
//! # Grouping
//!
//! - Blanks, duplicates and check assays: element × lab × sample type
//!   ([`GroupKey`]); an unmapped lab is [`DEFAULT_LAB`], an unmapped type is
//!   [`UNKNOWN_TYPE`].
//! - CRM: element × reference material.
//! - Z-scores: one series over all scored rows.
//!
//! Within a group rows keep their input order, then are stably sorted by
//! date when a date column is mapped.
//!
//! # Examples
//!
//! ```
//! use qaqc_analytics::cleaning::RawValue;
//! use qaqc_analytics::dataset::{run_blanks, ColumnMapping, Row, RowFilter};
//!
//! let rows: Vec<Row> = [0.005, 0.02, 0.003]
//!     .iter()
//!     .map(|&v| {
//!         let mut row = Row::new();
//!         row.insert("Element".to_string(), RawValue::from("Au"));
//!         row.insert("Au_ppm".to_string(), RawValue::from(v));
//!         row
//!     })
//!     .collect();
//! let mapping = ColumnMapping {
//!     element: Some("Element".to_string()),
//!     value: Some("Au_ppm".to_string()),
//!     ..ColumnMapping::default()
//! };
//!
//! let groups = run_blanks(&rows, &mapping, &RowFilter::default(), None).unwrap();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].summary.fails, 1);
//! ```

mod filter;
mod group;
mod mapping;
mod runner;

pub use filter::{CategoricalFilter, DateRange, NumericRange, RowFilter};
pub use group::{group_rows_by, sort_by_date, GroupKey, DEFAULT_LAB, UNKNOWN_TYPE};
pub use mapping::{ColumnMapping, Row};
pub use runner::{
    run_blanks, run_check_assay, run_crm, run_duplicates, run_z_scores, BlankGroupResult,
    CheckAssayGroupResult, CrmGroupResult, DuplicateGroupResult, ZScoreRun, DEFAULT_ELEMENT,
};
