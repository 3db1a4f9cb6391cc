//! Blank contamination checks.
//!
//! A blank should carry none of the analyte. Each blank assay is compared to a
//! limit, either one value for the whole group or a per-sample limit derived
//! from the detection limit (for example 5 × LOD). A blank fails only when it
//! is strictly above its limit; a value equal to the limit passes.
//!
//! The analyzer is group-agnostic: callers partition rows by
//! element × lab × type (see [`crate::dataset`]) and call it once per group.
//!
//! # Examples
//!
//! ```
//! use qaqc_analytics::blanks::{analyze_blanks, BlankLimit};
//!
//! let result = analyze_blanks(&[0.005, 0.02, 0.003], &BlankLimit::Scalar(0.01), None).unwrap();
//! let flags: Vec<bool> = result.points.iter().map(|p| p.is_failure).collect();
//! assert_eq!(flags, vec![false, true, false]);
//! assert!((result.summary.failure_rate - 100.0 / 3.0).abs() < 1e-10);
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, Result};
use crate::json::nan_or_f64;
use crate::stats;

/// Limit used when no limit column is mapped.
pub const DEFAULT_BLANK_LIMIT: f64 = 0.01;

/// Failure limit for a group of blanks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlankLimit {
    /// One limit for every sample.
    Scalar(f64),
    /// One limit per sample, parallel to the values.
    PerSample(Vec<f64>),
}

impl Default for BlankLimit {
    fn default() -> Self {
        BlankLimit::Scalar(DEFAULT_BLANK_LIMIT)
    }
}

impl BlankLimit {
    fn at(&self, index: usize) -> f64 {
        match self {
            BlankLimit::Scalar(l) => *l,
            BlankLimit::PerSample(ls) => ls[index],
        }
    }

    /// The scalar itself, or the mean of the non-`NaN` per-sample limits.
    pub fn representative(&self) -> f64 {
        match self {
            BlankLimit::Scalar(l) => *l,
            BlankLimit::PerSample(ls) => {
                let finite: Vec<f64> = ls.iter().copied().filter(|l| !l.is_nan()).collect();
                stats::mean(&finite)
            }
        }
    }
}

/// One blank on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankPoint {
    /// Position in the input series.
    pub index: usize,
    /// Sample date, when a date column is mapped.
    pub date: Option<NaiveDateTime>,
    /// Blank assay value.
    pub value: f64,
    /// Limit applied to this sample; `NaN` (never failing) if the per-sample
    /// limit is missing.
    #[serde(deserialize_with = "nan_or_f64")]
    pub limit: f64,
    /// Value strictly above `limit`.
    pub is_failure: bool,
}

/// Aggregate of one blanks group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankSummary {
    /// Valid (non-`NaN`) blanks in the group.
    pub samples: usize,
    /// Blanks above their limit.
    pub fails: usize,
    /// `100 · fails / samples`; `NaN` for an empty group.
    #[serde(deserialize_with = "nan_or_f64")]
    pub failure_rate: f64,
    /// Representative limit, see [`BlankLimit::representative`].
    #[serde(deserialize_with = "nan_or_f64")]
    pub limit: f64,
    /// Smallest valid blank value.
    #[serde(deserialize_with = "nan_or_f64")]
    pub min_value: f64,
    /// Largest valid blank value.
    #[serde(deserialize_with = "nan_or_f64")]
    pub max_value: f64,
    /// Mean of the valid blank values.
    #[serde(deserialize_with = "nan_or_f64")]
    pub mean_value: f64,
}

/// Per-sample points plus the group summary of a blanks check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlanksAnalysis {
    /// One point per valid blank, in input order.
    pub points: Vec<BlankPoint>,
    /// Aggregate over `points`.
    pub summary: BlankSummary,
}

/// Whether a blank exceeds its limit. Equality passes.
pub fn is_blank_failure(value: f64, limit: f64) -> bool {
    value > limit
}

/// Per-sample limits as `factor × LOD`.
pub fn calculate_lod_limit(lod_values: &[f64], factor: f64) -> Vec<f64> {
    lod_values.iter().map(|lod| lod * factor).collect()
}

/// Classifies every valid blank and summarizes the group.
///
/// `NaN` values are skipped; points keep their input index.
///
/// # Errors
///
/// [`crate::AnalysisError::LengthMismatch`] if a per-sample limit or the
/// date slice is not parallel to `values`.
pub fn analyze_blanks(
    values: &[f64],
    limit: &BlankLimit,
    dates: Option<&[Option<NaiveDateTime>]>,
) -> Result<BlanksAnalysis> {
    if let BlankLimit::PerSample(ls) = limit {
        ensure_same_len("blank value/limit", values.len(), ls.len())?;
    }
    if let Some(dates) = dates {
        ensure_same_len("blank value/date", values.len(), dates.len())?;
    }

    let mut points = Vec::with_capacity(values.len());
    let mut valid = Vec::with_capacity(values.len());
    let mut fails = 0;

    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        let point_limit = limit.at(i);
        let is_failure = is_blank_failure(value, point_limit);
        if is_failure {
            fails += 1;
        }
        valid.push(value);
        points.push(BlankPoint {
            index: i,
            date: dates.and_then(|d| d[i]),
            value,
            limit: point_limit,
            is_failure,
        });
    }

    let summary = BlankSummary {
        samples: valid.len(),
        fails,
        failure_rate: stats::rate_percent(fails, valid.len()),
        limit: limit.representative(),
        min_value: stats::min(&valid),
        max_value: stats::max(&valid),
        mean_value: stats::mean(&valid),
    };
    tracing::debug!(samples = summary.samples, fails, "blanks analysis complete");

    Ok(BlanksAnalysis { points, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn boundary_equal_passes() {
        assert!(!is_blank_failure(0.01, 0.01));
        assert!(is_blank_failure(0.01 + 1e-9, 0.01));
        assert!(!is_blank_failure(0.0, 0.01));
    }

    #[test]
    fn scalar_limit_group() {
        let r = analyze_blanks(&[0.005, 0.02, 0.003], &BlankLimit::Scalar(0.01), None).unwrap();
        let flags: Vec<bool> = r.points.iter().map(|p| p.is_failure).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(r.summary.samples, 3);
        assert_eq!(r.summary.fails, 1);
        assert!((r.summary.failure_rate - 100.0 / 3.0).abs() < 1e-10);
        assert_eq!(r.summary.min_value, 0.003);
        assert_eq!(r.summary.max_value, 0.02);
        assert_eq!(r.summary.limit, 0.01);
    }

    #[test]
    fn per_sample_limits() {
        let lods = [0.001, 0.002, 0.001];
        let limit = BlankLimit::PerSample(calculate_lod_limit(&lods, 5.0));
        let r = analyze_blanks(&[0.004, 0.011, 0.006], &limit, None).unwrap();
        let flags: Vec<bool> = r.points.iter().map(|p| p.is_failure).collect();
        assert_eq!(flags, vec![false, true, true]);
        assert!((r.points[1].limit - 0.01).abs() < 1e-12);
        let expected_rep = (0.005 + 0.01 + 0.005) / 3.0;
        assert!((r.summary.limit - expected_rep).abs() < 1e-12);
    }

    #[test]
    fn nan_values_skipped_but_indices_kept() {
        let r = analyze_blanks(&[f64::NAN, 0.5, 0.001], &BlankLimit::Scalar(0.1), None).unwrap();
        assert_eq!(r.points.len(), 2);
        assert_eq!(r.points[0].index, 1);
        assert_eq!(r.summary.samples, 2);
        assert!((r.summary.failure_rate - 50.0).abs() < 1e-12);
    }

    #[test]
    fn missing_per_sample_limit_never_fails() {
        let limit = BlankLimit::PerSample(vec![f64::NAN, 0.01]);
        let r = analyze_blanks(&[5.0, 5.0], &limit, None).unwrap();
        assert!(!r.points[0].is_failure);
        assert!(r.points[1].is_failure);
        assert_eq!(r.summary.limit, 0.01);
    }

    #[test]
    fn empty_group_is_undefined_rate() {
        let r = analyze_blanks(&[], &BlankLimit::default(), None).unwrap();
        assert_eq!(r.summary.samples, 0);
        assert!(r.summary.failure_rate.is_nan());
        assert!(r.summary.mean_value.is_nan());
    }

    #[test]
    fn mismatched_limits_rejected() {
        let err = analyze_blanks(&[1.0, 2.0], &BlankLimit::PerSample(vec![1.0]), None).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::LengthMismatch {
                context: "blank value/limit",
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn mismatched_dates_rejected() {
        let dates = [None];
        assert!(analyze_blanks(&[1.0, 2.0], &BlankLimit::Scalar(1.0), Some(&dates)).is_err());
    }

    #[test]
    fn limit_deserializes_from_number_or_array() {
        let s: BlankLimit = serde_json::from_str("0.05").expect("scalar");
        assert_eq!(s, BlankLimit::Scalar(0.05));
        let p: BlankLimit = serde_json::from_str("[0.1, 0.2]").expect("array");
        assert_eq!(p, BlankLimit::PerSample(vec![0.1, 0.2]));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn fails_never_exceed_samples(
            values in proptest::collection::vec(0.0_f64..1.0, 0..=50),
            limit in 0.0_f64..1.0
        ) {
            let r = analyze_blanks(&values, &BlankLimit::Scalar(limit), None).unwrap();
            prop_assert!(r.summary.fails <= r.summary.samples);
            prop_assert_eq!(r.summary.samples, values.len());
            let flagged = r.points.iter().filter(|p| p.is_failure).count();
            prop_assert_eq!(flagged, r.summary.fails);
        }

        #[test]
        fn limit_above_max_means_no_failures(
            values in proptest::collection::vec(0.0_f64..1.0, 1..=50)
        ) {
            let r = analyze_blanks(&values, &BlankLimit::Scalar(1.0), None).unwrap();
            prop_assert_eq!(r.summary.fails, 0);
            prop_assert_eq!(r.summary.failure_rate, 0.0);
        }
    }
}
