//! Parsed rows and the column-role mapping applied to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cleaning::RawValue;
use crate::error::{AnalysisError, Result};

/// One parsed CSV row: column name to cell.
pub type Row = BTreeMap<String, RawValue>;

/// Which column plays which role.
///
/// Unmapped roles are `None`; an empty column name counts as unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnMapping {
    /// Element (analyte) name.
    pub element: Option<String>,
    /// Laboratory name.
    pub lab: Option<String>,
    /// Sample type, e.g. blank kind or duplicate kind.
    #[serde(rename = "type")]
    pub sample_type: Option<String>,
    /// Reference material name.
    pub crm: Option<String>,
    /// Assay value (grade).
    pub value: Option<String>,
    /// Certified expected value.
    pub expected: Option<String>,
    /// Certified standard deviation.
    pub sd: Option<String>,
    /// Per-sample blank limit.
    pub limit: Option<String>,
    /// Sample or assay date.
    pub date: Option<String>,
    /// Original assay of a duplicate or check pair.
    pub original: Option<String>,
    /// Duplicate or check assay of the pair.
    pub duplicate: Option<String>,
}

fn mapped(column: &Option<String>) -> Option<&str> {
    column.as_deref().filter(|c| !c.trim().is_empty())
}

impl ColumnMapping {
    /// Mapped element column.
    pub fn element(&self) -> Option<&str> {
        mapped(&self.element)
    }

    /// Mapped lab column.
    pub fn lab(&self) -> Option<&str> {
        mapped(&self.lab)
    }

    /// Mapped sample-type column.
    pub fn sample_type(&self) -> Option<&str> {
        mapped(&self.sample_type)
    }

    /// Mapped reference-material column.
    pub fn crm(&self) -> Option<&str> {
        mapped(&self.crm)
    }

    /// Mapped assay value column.
    pub fn value(&self) -> Option<&str> {
        mapped(&self.value)
    }

    /// Mapped expected-value column.
    pub fn expected(&self) -> Option<&str> {
        mapped(&self.expected)
    }

    /// Mapped standard-deviation column.
    pub fn sd(&self) -> Option<&str> {
        mapped(&self.sd)
    }

    /// Mapped per-sample limit column.
    pub fn limit(&self) -> Option<&str> {
        mapped(&self.limit)
    }

    /// Mapped date column.
    pub fn date(&self) -> Option<&str> {
        mapped(&self.date)
    }

    /// Mapped original-assay column.
    pub fn original(&self) -> Option<&str> {
        mapped(&self.original)
    }

    /// Mapped duplicate-assay column.
    pub fn duplicate(&self) -> Option<&str> {
        mapped(&self.duplicate)
    }
}

/// Column for a role the analysis cannot run without.
pub(crate) fn require<'a>(column: Option<&'a str>, role: &'static str) -> Result<&'a str> {
    column.ok_or(AnalysisError::MissingColumn(role))
}

/// The cell in `column`, treating absent columns as missing cells.
pub(crate) fn cell<'a>(row: &'a Row, column: &str) -> &'a RawValue {
    static MISSING: RawValue = RawValue::Missing;
    row.get(column).unwrap_or(&MISSING)
}

/// String form of the cell, or `fallback` when the role is unmapped.
pub(crate) fn label_or(row: &Row, column: Option<&str>, fallback: &str) -> String {
    match column {
        Some(c) => cell(row, c).as_label(),
        None => fallback.to_string(),
    }
}
