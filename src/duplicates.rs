//! Duplicate precision via the HARD index.
//!
//! HARD (Half Absolute Relative Difference) measures how far a duplicate
//! assay sits from its original:
//!
//! ```text
//! HARD = |duplicate − original| / (duplicate + original) · 100
//! ```
//!
//! A pair fails when its HARD exceeds the threshold for the duplicate type:
//! 10 % for pulp, 20 % for coarse reject and 30 % for field duplicates (and
//! for unrecognized types). Deposits with a strong nugget effect get 10
//! extra percentage points.
//!
//! # References
//!
//! - Abzalov, M. (2008). "Quality Control of Assay Data", *Exploration and
//!   Mining Geology* 17(3-4), pp. 131-144.
//! - Stanley, C.R. & Lawie, D. (2007). "Average relative error in
//!   geochemical determinations", *Geochemistry: Exploration, Environment,
//!   Analysis* 7, pp. 135-153.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, AnalysisError, Result};
use crate::json::nan_or_f64;
use crate::stats;

/// Extra percentage points granted to nugget-effect deposits.
const NUGGET_ALLOWANCE: f64 = 10.0;

/// Axis headroom applied to the largest assay in the scatter plot.
const SCATTER_HEADROOM: f64 = 1.05;

/// Kind of duplicate, parsed from its `PD` / `CD` / `FD` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DuplicateType {
    /// `PD`: pulp duplicate.
    Pulp,
    /// `CD`: coarse reject duplicate.
    Coarse,
    /// `FD`: field duplicate.
    Field,
    /// Any other tag; thresholds fall back to the field-duplicate value.
    Other(String),
}

impl DuplicateType {
    /// Parses a type tag. Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "PD" => DuplicateType::Pulp,
            "CD" => DuplicateType::Coarse,
            "FD" => DuplicateType::Field,
            other => DuplicateType::Other(other.to_string()),
        }
    }

    /// The tag this type was parsed from.
    pub fn tag(&self) -> &str {
        match self {
            DuplicateType::Pulp => "PD",
            DuplicateType::Coarse => "CD",
            DuplicateType::Field => "FD",
            DuplicateType::Other(tag) => tag,
        }
    }

    /// Base HARD threshold in percent, without the nugget allowance.
    pub fn base_threshold(&self) -> f64 {
        match self {
            DuplicateType::Pulp => 10.0,
            DuplicateType::Coarse => 20.0,
            DuplicateType::Field | DuplicateType::Other(_) => 30.0,
        }
    }

    /// HARD threshold in percent.
    pub fn threshold(&self, nugget_effect: bool) -> f64 {
        if nugget_effect {
            self.base_threshold() + NUGGET_ALLOWANCE
        } else {
            self.base_threshold()
        }
    }
}

impl fmt::Display for DuplicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Options for a duplicates analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DuplicateOptions {
    /// `PD`, `CD`, `FD` or any other tag.
    pub duplicate_type: String,
    /// Adds 10 percentage points to the threshold.
    pub nugget_effect: bool,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            duplicate_type: "FD".to_string(),
            nugget_effect: false,
        }
    }
}

impl DuplicateOptions {
    /// The parsed duplicate type.
    pub fn kind(&self) -> DuplicateType {
        DuplicateType::from_tag(&self.duplicate_type)
    }

    /// Rejects a blank type tag.
    pub fn validate(&self) -> Result<()> {
        if self.duplicate_type.trim().is_empty() {
            return Err(AnalysisError::InvalidOption {
                field: "duplicateType",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// One original/duplicate pair with its HARD value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    /// Position in the input arrays.
    pub index: usize,
    /// Original assay.
    pub original: f64,
    /// Duplicate assay.
    pub duplicate: f64,
    /// `NaN` when both assays are zero.
    #[serde(deserialize_with = "nan_or_f64")]
    pub hard: f64,
    /// HARD strictly above the threshold.
    pub is_failure: bool,
}

/// Aggregate of a duplicates analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSummary {
    /// Valid pairs.
    pub pairs: usize,
    /// Pairs above the threshold.
    pub fails: usize,
    /// `100 · fails / pairs`; `NaN` without pairs.
    #[serde(deserialize_with = "nan_or_f64")]
    pub failure_rate: f64,
    /// Pearson correlation between originals and duplicates.
    #[serde(deserialize_with = "nan_or_f64")]
    pub correlation: f64,
    /// Mean of `duplicate − original`.
    #[serde(deserialize_with = "nan_or_f64")]
    pub mean_delta: f64,
    /// Smallest original assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub min_original: f64,
    /// Largest original assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub max_original: f64,
    /// Mean original assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub mean_original: f64,
    /// Resolved HARD threshold in percent.
    pub threshold: f64,
}

/// Per-pair results plus the summary of a duplicates analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatesAnalysis {
    /// Valid pairs in input order.
    pub pairs: Vec<DuplicatePair>,
    /// Aggregate over `pairs`.
    pub summary: DuplicateSummary,
}

/// A point of the ranked HARD chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardRankPoint {
    /// Cumulative share of pairs at or below this HARD value, in percent.
    pub percentile: f64,
    /// HARD value in percent.
    #[serde(deserialize_with = "nan_or_f64")]
    pub hard: f64,
    /// Pair failed its threshold.
    pub is_failure: bool,
}

/// A point of the original-vs-duplicate scatter plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPoint {
    /// Original assay.
    pub x: f64,
    /// Duplicate assay.
    pub y: f64,
    /// Pair failed its threshold.
    pub is_failure: bool,
}

/// Scatter plot with its envelope and axis extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateScatter {
    /// One point per valid pair.
    pub points: Vec<ScatterPoint>,
    /// Envelope half-width in percent (base threshold of the type).
    pub envelope_percent: f64,
    /// Axis maximum: 105 % of the largest assay; `NaN` without pairs.
    #[serde(deserialize_with = "nan_or_f64")]
    pub max_value: f64,
}

/// HARD index of one pair, in percent. `NaN` when the pair sums to zero.
///
/// # Examples
///
/// ```
/// use qaqc_analytics::duplicates::calculate_hard;
///
/// assert_eq!(calculate_hard(10.0, 10.0), 0.0);
/// assert!((calculate_hard(10.0, 20.0) - 100.0 / 3.0).abs() < 1e-10);
/// assert!(calculate_hard(0.0, 0.0).is_nan());
/// ```
pub fn calculate_hard(original: f64, duplicate: f64) -> f64 {
    let sum = original + duplicate;
    if sum == 0.0 {
        return f64::NAN;
    }
    (duplicate - original).abs() / sum * 100.0
}

/// HARD threshold in percent for a type tag.
pub fn hard_threshold(duplicate_type: &str, nugget_effect: bool) -> f64 {
    DuplicateType::from_tag(duplicate_type).threshold(nugget_effect)
}

/// Computes HARD values, failures and the summary for paired assays.
///
/// Pairs where either member is `NaN` are dropped entirely.
///
/// # Errors
///
/// [`AnalysisError::LengthMismatch`] if the arrays differ in length;
/// [`AnalysisError::InvalidOption`] for an empty type tag.
pub fn analyze_duplicates(
    original_values: &[f64],
    duplicate_values: &[f64],
    options: &DuplicateOptions,
) -> Result<DuplicatesAnalysis> {
    options.validate()?;
    ensure_same_len("original/duplicate", original_values.len(), duplicate_values.len())?;

    let threshold = options.kind().threshold(options.nugget_effect);

    let pairs: Vec<DuplicatePair> = original_values
        .iter()
        .zip(duplicate_values)
        .enumerate()
        .filter(|(_, (o, d))| !o.is_nan() && !d.is_nan())
        .map(|(index, (&original, &duplicate))| {
            let hard = calculate_hard(original, duplicate);
            DuplicatePair {
                index,
                original,
                duplicate,
                hard,
                is_failure: hard > threshold,
            }
        })
        .collect();

    let originals: Vec<f64> = pairs.iter().map(|p| p.original).collect();
    let duplicates: Vec<f64> = pairs.iter().map(|p| p.duplicate).collect();
    let deltas: Vec<f64> = pairs.iter().map(|p| p.duplicate - p.original).collect();
    let fails = pairs.iter().filter(|p| p.is_failure).count();

    let summary = DuplicateSummary {
        pairs: pairs.len(),
        fails,
        failure_rate: stats::rate_percent(fails, pairs.len()),
        correlation: stats::correlation(&originals, &duplicates),
        mean_delta: stats::mean(&deltas),
        min_original: stats::min(&originals),
        max_original: stats::max(&originals),
        mean_original: stats::mean(&originals),
        threshold,
    };
    tracing::debug!(
        duplicate_type = %options.kind(),
        pairs = summary.pairs,
        fails,
        threshold,
        "duplicates analysis complete"
    );

    Ok(DuplicatesAnalysis { pairs, summary })
}

/// Ranked HARD series: pairs sorted ascending by HARD, percentile
/// `100 · (rank + 1) / n`. Undefined HARD values sort last.
pub fn hard_chart_data(pairs: &[DuplicatePair]) -> Vec<HardRankPoint> {
    let mut sorted: Vec<&DuplicatePair> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.hard.total_cmp(&b.hard));
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(rank, p)| HardRankPoint {
            percentile: (rank + 1) as f64 / n * 100.0,
            hard: p.hard,
            is_failure: p.is_failure,
        })
        .collect()
}

/// Scatter points with the envelope of the duplicate type.
///
/// The envelope uses the base threshold; the nugget allowance only affects
/// failure classification.
pub fn duplicate_scatter_data(pairs: &[DuplicatePair], duplicate_type: &str) -> DuplicateScatter {
    let points = pairs
        .iter()
        .map(|p| ScatterPoint {
            x: p.original,
            y: p.duplicate,
            is_failure: p.is_failure,
        })
        .collect();

    let max_value = if pairs.is_empty() {
        f64::NAN
    } else {
        pairs
            .iter()
            .map(|p| p.original.max(p.duplicate))
            .fold(f64::NEG_INFINITY, f64::max)
            * SCATTER_HEADROOM
    };

    DuplicateScatter {
        points,
        envelope_percent: DuplicateType::from_tag(duplicate_type).base_threshold(),
        max_value,
    }
}
