//! Per-group drivers from parsed rows to analyzer results.
//!
//! Every runner follows the same pipeline: filter the rows, resolve the
//! columns it needs from the mapping, partition into groups, order each group
//! by date when a date column is mapped, clean the cells and hand the numeric
//! series to the matching analyzer. Groups without a single valid value are
//! left out; an empty result is returned as such, never as an error.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::blanks::{analyze_blanks, BlankLimit, BlankPoint, BlankSummary, DEFAULT_BLANK_LIMIT};
use crate::check_assay::{analyze_check_assay, CheckAssayAnalysis, QqOptions};
use crate::cleaning::{clean_value, parse_date_value, parse_plain, Reading};
use crate::crm::{analyze_crm, CrmOptions, CrmPoint, CrmSummary};
use crate::duplicates::{
    analyze_duplicates, duplicate_scatter_data, hard_chart_data, DuplicateOptions, DuplicatePair,
    DuplicateScatter, DuplicateSummary, HardRankPoint,
};
use crate::error::Result;
use crate::stats;
use crate::zscore::{z_score_chart_data, z_score_summary, ZScoreInput, ZScorePoint, ZScoreSummary};

use super::filter::RowFilter;
use super::group::{group_rows_by, sort_by_date, GroupKey, UNKNOWN_TYPE};
use super::mapping::{cell, label_or, require, ColumnMapping, Row};

/// Element label of a Z-score run when no element column is mapped.
pub const DEFAULT_ELEMENT: &str = "Element";

/// Blanks result for one element × lab × type group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankGroupResult {
    /// Element × lab × type of the group.
    pub key: GroupKey,
    /// One point per valid blank, date ordered.
    pub points: Vec<BlankPoint>,
    /// Group summary.
    pub summary: BlankSummary,
}

/// CRM result for one element × reference material group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmGroupResult {
    /// Element label.
    pub element: String,
    /// Reference material label.
    pub crm: String,
    /// Group summary.
    pub summary: CrmSummary,
    /// One point per valid grade, date ordered.
    pub points: Vec<CrmPoint>,
}

/// All scored CRM results of a Z-score run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZScoreRun {
    /// Scored rows in date order.
    pub points: Vec<ZScorePoint>,
    /// Outlier counts over `points`.
    pub summary: ZScoreSummary,
    /// Rows dropped for an unparseable value, expected value or SD, or a
    /// zero SD.
    pub skipped: usize,
}

/// Duplicates result for one element × lab × type group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroupResult {
    /// Element × lab × type of the group.
    pub key: GroupKey,
    /// Valid pairs with their HARD values.
    pub pairs: Vec<DuplicatePair>,
    /// Group summary.
    pub summary: DuplicateSummary,
    /// Pairs ranked by HARD.
    pub ranked: Vec<HardRankPoint>,
    /// Original-vs-duplicate scatter.
    pub scatter: DuplicateScatter,
}

/// Check-assay result for one element × lab × type group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAssayGroupResult {
    /// Element × lab × type of the group.
    pub key: GroupKey,
    /// Summary, scatter and Q-Q data.
    #[serde(flatten)]
    pub analysis: CheckAssayAnalysis,
}

fn cleaned(rows: &[&Row], column: &str) -> Vec<f64> {
    rows.iter().map(|r| clean_value(cell(r, column)).or_nan()).collect()
}

fn dates(rows: &[&Row], column: Option<&str>) -> Option<Vec<Option<NaiveDateTime>>> {
    column.map(|c| rows.iter().map(|r| parse_date_value(cell(r, c))).collect())
}

/// Mean of the strictly positive plain numbers in `column`.
fn positive_mean(rows: &[&Row], column: Option<&str>) -> Option<f64> {
    let column = column?;
    let positive: Vec<f64> = rows
        .iter()
        .filter_map(|r| parse_plain(cell(r, column)).value())
        .filter(|v| *v > 0.0)
        .collect();
    if positive.is_empty() {
        None
    } else {
        Some(stats::mean(&positive))
    }
}

/// Reference material name, `Unknown` when unmapped or blank.
fn crm_label(row: &Row, column: Option<&str>) -> String {
    let label = label_or(row, column, UNKNOWN_TYPE);
    if label.trim().is_empty() {
        UNKNOWN_TYPE.to_string()
    } else {
        label
    }
}

/// Filters, groups by element × lab × type and orders each group by date.
fn keyed_groups<'a>(
    rows: &'a [Row],
    mapping: &ColumnMapping,
    filter: &RowFilter,
    element: &str,
) -> Vec<(GroupKey, Vec<&'a Row>)> {
    let kept = filter.apply(rows, mapping);
    group_rows_by(&kept, |r| GroupKey::of(r, element, mapping))
        .into_iter()
        .map(|(key, mut group)| {
            if let Some(date) = mapping.date() {
                sort_by_date(&mut group, date);
            }
            (key, group)
        })
        .collect()
}

/// Runs the blanks check for every element × lab × type group.
///
/// The per-row `limit` column is used when mapped, otherwise `default_limit`
/// (0.01 when `None`) applies to every sample. An unparseable per-row limit
/// never fails its sample.
///
/// # Errors
///
/// [`crate::AnalysisError::MissingColumn`] if `element` or `value` is unmapped.
pub fn run_blanks(
    rows: &[Row],
    mapping: &ColumnMapping,
    filter: &RowFilter,
    default_limit: Option<f64>,
) -> Result<Vec<BlankGroupResult>> {
    let element = require(mapping.element(), "element")?;
    let value = require(mapping.value(), "value")?;

    let mut results = Vec::new();
    for (key, group) in keyed_groups(rows, mapping, filter, element) {
        let values = cleaned(&group, value);
        let limit = match mapping.limit() {
            Some(column) => BlankLimit::PerSample(cleaned(&group, column)),
            None => BlankLimit::Scalar(default_limit.unwrap_or(DEFAULT_BLANK_LIMIT)),
        };
        let dates = dates(&group, mapping.date());
        let analysis = analyze_blanks(&values, &limit, dates.as_deref())?;
        if analysis.summary.samples == 0 {
            tracing::debug!(?key, "blank group has no valid values");
            continue;
        }
        results.push(BlankGroupResult {
            key,
            points: analysis.points,
            summary: analysis.summary,
        });
    }
    Ok(results)
}

/// Runs the CRM control chart for every element × reference material group.
///
/// Rows with an unparseable grade are dropped. The expected value is the mean
/// of the positive values in the `expected` column, falling back to the grade
/// mean; a positive `sd` column mean replaces `options.expected_sd`.
///
/// # Errors
///
/// Missing `element`, `crm` or `value` mapping, or invalid options.
pub fn run_crm(
    rows: &[Row],
    mapping: &ColumnMapping,
    filter: &RowFilter,
    options: &CrmOptions,
) -> Result<Vec<CrmGroupResult>> {
    options.validate()?;
    let element = require(mapping.element(), "element")?;
    let crm = require(mapping.crm(), "crm")?;
    let value = require(mapping.value(), "value")?;

    let kept = filter.apply(rows, mapping);
    let groups = group_rows_by(&kept, |r| {
        (cell(r, element).as_label(), cell(r, crm).as_label())
    });

    let mut results = Vec::new();
    let mut dropped = 0;
    for ((element_label, material), mut group) in groups {
        let before = group.len();
        group.retain(|r| clean_value(cell(r, value)).is_valid());
        dropped += before - group.len();
        if group.is_empty() {
            continue;
        }
        if let Some(date) = mapping.date() {
            sort_by_date(&mut group, date);
        }

        let grades = cleaned(&group, value);
        let expected =
            positive_mean(&group, mapping.expected()).unwrap_or_else(|| stats::mean(&grades));
        let group_options = CrmOptions {
            expected_sd: positive_mean(&group, mapping.sd()).or(options.expected_sd),
            ..options.clone()
        };
        let dates = dates(&group, mapping.date());
        let analysis = analyze_crm(&grades, dates.as_deref(), expected, &group_options)?;
        results.push(CrmGroupResult {
            element: element_label,
            crm: material,
            summary: analysis.summary,
            points: analysis.points,
        });
    }
    if dropped > 0 {
        tracing::warn!(dropped, "CRM rows with unparseable grades were skipped");
    }
    Ok(results)
}

/// Scores every row that carries a value, expected value and non-zero SD.
///
/// The value is cleaned like any assay; the expected value and SD must be
/// plain numbers, so a `<` or `>` prefix there skips the row.
///
/// The summary is labelled with the distinct element names of the scored
/// rows, or [`DEFAULT_ELEMENT`] when no element column is mapped.
///
/// # Errors
///
/// Missing `value`, `expected` or `sd` mapping.
pub fn run_z_scores(
    rows: &[Row],
    mapping: &ColumnMapping,
    filter: &RowFilter,
) -> Result<ZScoreRun> {
    let value = require(mapping.value(), "value")?;
    let expected = require(mapping.expected(), "expected")?;
    let sd = require(mapping.sd(), "sd")?;

    let kept = filter.apply(rows, mapping);
    let mut inputs = Vec::with_capacity(kept.len());
    let mut elements = BTreeSet::new();
    let mut skipped = 0;
    for row in &kept {
        let triple = (
            clean_value(cell(row, value)),
            parse_plain(cell(row, expected)),
            parse_plain(cell(row, sd)),
        );
        let (Reading::Valid(v), Reading::Valid(e), Reading::Valid(s)) = triple else {
            skipped += 1;
            continue;
        };
        if s == 0.0 {
            skipped += 1;
            continue;
        }
        if let Some(column) = mapping.element() {
            elements.insert(cell(row, column).as_label());
        }
        inputs.push(ZScoreInput {
            date: mapping.date().and_then(|c| parse_date_value(cell(row, c))),
            value: v,
            expected: e,
            sd: s,
            crm: Some(crm_label(row, mapping.crm())),
            company: mapping.lab().map(|c| cell(row, c).as_label()),
        });
    }
    if skipped > 0 {
        tracing::warn!(
            skipped,
            scored = inputs.len(),
            "rows without a usable z-score were skipped"
        );
    }

    let points = z_score_chart_data(&inputs);
    let z: Vec<f64> = points.iter().map(|p| p.z_score).collect();
    let label = if elements.is_empty() {
        DEFAULT_ELEMENT.to_string()
    } else {
        elements.into_iter().collect::<Vec<_>>().join(", ")
    };
    let summary = z_score_summary(&label, &z);
    Ok(ZScoreRun {
        points,
        summary,
        skipped,
    })
}

/// Runs the HARD analysis for every element × lab × type group.
///
/// # Errors
///
/// Missing `element`, `original` or `duplicate` mapping, or invalid options.
pub fn run_duplicates(
    rows: &[Row],
    mapping: &ColumnMapping,
    filter: &RowFilter,
    options: &DuplicateOptions,
) -> Result<Vec<DuplicateGroupResult>> {
    options.validate()?;
    let element = require(mapping.element(), "element")?;
    let original = require(mapping.original(), "original")?;
    let duplicate = require(mapping.duplicate(), "duplicate")?;

    let mut results = Vec::new();
    for (key, group) in keyed_groups(rows, mapping, filter, element) {
        let analysis = analyze_duplicates(
            &cleaned(&group, original),
            &cleaned(&group, duplicate),
            options,
        )?;
        if analysis.pairs.is_empty() {
            continue;
        }
        let ranked = hard_chart_data(&analysis.pairs);
        let scatter = duplicate_scatter_data(&analysis.pairs, &options.duplicate_type);
        results.push(DuplicateGroupResult {
            key,
            pairs: analysis.pairs,
            summary: analysis.summary,
            ranked,
            scatter,
        });
    }
    Ok(results)
}

/// Runs the check-assay comparison for every element × lab × type group.
///
/// # Errors
///
/// Missing `element`, `original` or `duplicate` mapping, or invalid Q-Q
/// options.
pub fn run_check_assay(
    rows: &[Row],
    mapping: &ColumnMapping,
    filter: &RowFilter,
    options: &QqOptions,
) -> Result<Vec<CheckAssayGroupResult>> {
    options.validate()?;
    let element = require(mapping.element(), "element")?;
    let original = require(mapping.original(), "original")?;
    let duplicate = require(mapping.duplicate(), "duplicate")?;

    let mut results = Vec::new();
    for (key, group) in keyed_groups(rows, mapping, filter, element) {
        let analysis = analyze_check_assay(
            &cleaned(&group, original),
            &cleaned(&group, duplicate),
            options,
        )?;
        if analysis.summary.count == 0 {
            continue;
        }
        results.push(CheckAssayGroupResult { key, analysis });
    }
    Ok(results)
}
