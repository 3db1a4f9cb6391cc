//! Check assays: the same pulps re-assayed by a second laboratory.
//!
//! Descriptive statistics are computed on the paired subset (both labs
//! reported a value), together with the inter-lab correlation. The Q-Q data
//! instead compares the two marginal distributions, each taken over its own
//! reported values.
//!
//! # Examples
//!
//! ```
//! use qaqc_analytics::check_assay::{check_assay_stats, qq_plot_data, QqOptions};
//!
//! let primary = [1.0, 2.0, 3.0, 4.0];
//! let umpire = [1.1, 2.1, 2.9, 4.2];
//! let s = check_assay_stats(&primary, &umpire).unwrap();
//! assert_eq!(s.count, 4);
//! assert!(s.correlation > 0.99);
//!
//! let qq = qq_plot_data(&primary, &umpire, &QqOptions { steps: 4 }).unwrap();
//! assert_eq!(qq.len(), 4);
//! assert!((qq[3].percentile - 100.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::cleaning::clean_numeric;
use crate::error::{ensure_same_len, AnalysisError, Result};
use crate::json::nan_or_f64;
use crate::stats;

/// Default number of Q-Q percentile steps.
pub const DEFAULT_QQ_STEPS: usize = 100;

/// Descriptive statistics of paired check assays.
///
/// Every field is `NaN` (and `count` zero) when no valid pair exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAssaySummary {
    /// Valid pairs (both assays present).
    pub count: usize,
    /// Mean of the original assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub mean_original: f64,
    /// Mean of the check assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub mean_duplicate: f64,
    /// Largest original assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub max_original: f64,
    /// Largest check assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub max_duplicate: f64,
    /// Smallest original assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub min_original: f64,
    /// Smallest check assay.
    #[serde(deserialize_with = "nan_or_f64")]
    pub min_duplicate: f64,
    /// Median of the original assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub median_original: f64,
    /// Median of the check assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub median_duplicate: f64,
    /// 75th percentile.
    #[serde(deserialize_with = "nan_or_f64")]
    pub q3_original: f64,
    /// 75th percentile of the check assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub q3_duplicate: f64,
    /// Sample standard deviation of the original assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub std_original: f64,
    /// Sample standard deviation of the check assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub std_duplicate: f64,
    /// Coefficient of variation in percent; `NaN` when the mean is zero.
    #[serde(deserialize_with = "nan_or_f64")]
    pub cv_original: f64,
    /// Coefficient of variation of the check assays, in percent.
    #[serde(deserialize_with = "nan_or_f64")]
    pub cv_duplicate: f64,
    /// Pearson correlation between original and check assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub correlation: f64,
}

/// Options for Q-Q data generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QqOptions {
    /// Number of evenly spaced percentiles, `100/steps` apart.
    pub steps: usize,
}

impl Default for QqOptions {
    fn default() -> Self {
        Self {
            steps: DEFAULT_QQ_STEPS,
        }
    }
}

impl QqOptions {
    /// Rejects zero steps.
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(AnalysisError::InvalidOption {
                field: "steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// One Q-Q point: the same percentile of both series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QqPoint {
    /// Percentile in `(0, 100]`.
    pub percentile: f64,
    /// Same percentile of the original assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub x_percentile: f64,
    /// Same percentile of the check assays.
    #[serde(deserialize_with = "nan_or_f64")]
    pub y_percentile: f64,
}

/// A paired original/check value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairPoint {
    /// Original assay.
    pub x: f64,
    /// Check assay.
    pub y: f64,
}

/// Everything a check-assay report needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAssayAnalysis {
    /// Descriptive statistics over the valid pairs.
    pub summary: CheckAssaySummary,
    /// Valid pairs in input order.
    pub scatter: Vec<PairPoint>,
    /// Marginal Q-Q series.
    pub qq: Vec<QqPoint>,
}

/// Pairs where both members are present, in input order.
fn valid_pairs(original_values: &[f64], duplicate_values: &[f64]) -> Vec<PairPoint> {
    original_values
        .iter()
        .zip(duplicate_values)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| PairPoint { x, y })
        .collect()
}

fn coefficient_of_variation(sd: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        return f64::NAN;
    }
    sd / mean * 100.0
}

/// Sorted copy of a series without its `NaN` values.
fn sorted_marginal(values: &[f64]) -> Vec<f64> {
    let mut sorted = clean_numeric(values);
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn marginal_percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    stats::percentile_sorted(sorted, p)
}

/// Descriptive statistics over the valid pairs.
///
/// A pair is valid only when both members are non-`NaN`; invalid pairs are
/// dropped before any statistic is computed.
///
/// # Errors
///
/// [`AnalysisError::LengthMismatch`] if the arrays differ in length.
pub fn check_assay_stats(
    original_values: &[f64],
    duplicate_values: &[f64],
) -> Result<CheckAssaySummary> {
    ensure_same_len("original/check", original_values.len(), duplicate_values.len())?;

    let pairs = valid_pairs(original_values, duplicate_values);
    let originals: Vec<f64> = pairs.iter().map(|p| p.x).collect();
    let duplicates: Vec<f64> = pairs.iter().map(|p| p.y).collect();

    let sorted_orig = sorted_marginal(&originals);
    let sorted_dup = sorted_marginal(&duplicates);

    let mean_original = stats::mean(&originals);
    let mean_duplicate = stats::mean(&duplicates);
    let std_original = stats::std_dev(&originals);
    let std_duplicate = stats::std_dev(&duplicates);

    Ok(CheckAssaySummary {
        count: pairs.len(),
        mean_original,
        mean_duplicate,
        max_original: stats::max(&originals),
        max_duplicate: stats::max(&duplicates),
        min_original: stats::min(&originals),
        min_duplicate: stats::min(&duplicates),
        median_original: marginal_percentile(&sorted_orig, 50.0),
        median_duplicate: marginal_percentile(&sorted_dup, 50.0),
        q3_original: marginal_percentile(&sorted_orig, 75.0),
        q3_duplicate: marginal_percentile(&sorted_dup, 75.0),
        std_original,
        std_duplicate,
        cv_original: coefficient_of_variation(std_original, mean_original),
        cv_duplicate: coefficient_of_variation(std_duplicate, mean_duplicate),
        correlation: stats::correlation(&originals, &duplicates),
    })
}

/// Q-Q data comparing the two marginal distributions.
///
/// For `p = (i + 1) / steps · 100`, `i = 0..steps`, emits the `p`-th
/// percentile of each series. Each series is taken over all of its own
/// non-`NaN` values, independently of the other, so the series need not
/// line up pair-by-pair or even have the same length.
///
/// # Errors
///
/// [`AnalysisError::InvalidOption`] if `steps` is zero.
pub fn qq_plot_data(
    original_values: &[f64],
    duplicate_values: &[f64],
    options: &QqOptions,
) -> Result<Vec<QqPoint>> {
    options.validate()?;

    let x = sorted_marginal(original_values);
    let y = sorted_marginal(duplicate_values);
    let steps = options.steps as f64;

    Ok((0..options.steps)
        .map(|i| {
            let p = ((i + 1) as f64 / steps * 100.0).min(100.0);
            QqPoint {
                percentile: p,
                x_percentile: marginal_percentile(&x, p),
                y_percentile: marginal_percentile(&y, p),
            }
        })
        .collect())
}

/// Scatter points for pairs where both members are present.
///
/// # Errors
///
/// [`AnalysisError::LengthMismatch`] if the arrays differ in length.
pub fn check_assay_scatter(
    original_values: &[f64],
    duplicate_values: &[f64],
) -> Result<Vec<PairPoint>> {
    ensure_same_len("original/check", original_values.len(), duplicate_values.len())?;
    Ok(valid_pairs(original_values, duplicate_values))
}

/// Summary, scatter and Q-Q data in one call.
///
/// # Errors
///
/// Mismatched lengths or invalid Q-Q options.
pub fn analyze_check_assay(
    original_values: &[f64],
    duplicate_values: &[f64],
    options: &QqOptions,
) -> Result<CheckAssayAnalysis> {
    let summary = check_assay_stats(original_values, duplicate_values)?;
    let scatter = check_assay_scatter(original_values, duplicate_values)?;
    let qq = qq_plot_data(original_values, duplicate_values, options)?;
    tracing::debug!(
        pairs = summary.count,
        inputs = original_values.len(),
        correlation = summary.correlation,
        "check assay analysis complete"
    );
    Ok(CheckAssayAnalysis { summary, scatter, qq })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn qq_is_monotonic(
            x in proptest::collection::vec(-1e3_f64..1e3, 1..=50),
            y in proptest::collection::vec(-1e3_f64..1e3, 1..=50),
            steps in 1usize..=120
        ) {
            let qq = qq_plot_data(&x, &y, &QqOptions { steps }).unwrap();
            prop_assert_eq!(qq.len(), steps);
            for w in qq.windows(2) {
                prop_assert!(w[1].x_percentile >= w[0].x_percentile - 1e-9);
                prop_assert!(w[1].y_percentile >= w[0].y_percentile - 1e-9);
            }
        }

        #[test]
        fn count_matches_scatter(
            pairs in proptest::collection::vec(
                (
                    prop_oneof![Just(f64::NAN), 0.0_f64..10.0],
                    prop_oneof![Just(f64::NAN), 0.0_f64..10.0],
                ),
                0..=40
            )
        ) {
            let (x, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let s = check_assay_stats(&x, &y).unwrap();
            let scatter = check_assay_scatter(&x, &y).unwrap();
            prop_assert_eq!(s.count, scatter.len());
        }
    }
}
