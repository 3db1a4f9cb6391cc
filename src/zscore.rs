//! Z-score charts for reference material results.
//!
//! Each result is standardized against its own certified value and standard
//! deviation, `z = (value − expected) / sd`, so different CRMs and grades
//! share one chart with fixed reference lines at 0, ±2 and ±3.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, Result};
use crate::json::nan_or_f64;
use crate::stats;

/// A fixed horizontal reference line on a Z-score chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlLine {
    /// Z value the line is drawn at.
    pub value: f64,
    /// Legend label.
    pub label: &'static str,
    /// Drawn dashed rather than solid.
    pub dashed: bool,
}

/// Reference lines drawn on every Z-score chart.
pub const Z_SCORE_CONTROL_LINES: [ControlLine; 5] = [
    ControlLine {
        value: 3.0,
        label: "+3 SD",
        dashed: false,
    },
    ControlLine {
        value: -3.0,
        label: "-3 SD",
        dashed: false,
    },
    ControlLine {
        value: 2.0,
        label: "+2 SD",
        dashed: false,
    },
    ControlLine {
        value: -2.0,
        label: "-2 SD",
        dashed: false,
    },
    ControlLine {
        value: 0.0,
        label: "0",
        dashed: true,
    },
];

/// Z-score of one result. `NaN` when `sd == 0`.
///
/// # Examples
///
/// ```
/// use qaqc_analytics::zscore::calculate_z_score;
///
/// assert_eq!(calculate_z_score(12.0, 10.0, 2.0), 1.0);
/// assert!(calculate_z_score(12.0, 10.0, 0.0).is_nan());
/// ```
pub fn calculate_z_score(value: f64, expected: f64, sd: f64) -> f64 {
    if sd == 0.0 {
        return f64::NAN;
    }
    (value - expected) / sd
}

/// Z-scores of parallel value / expected / sd arrays.
///
/// # Errors
///
/// [`crate::AnalysisError::LengthMismatch`] unless all three arrays have the
/// same length.
pub fn calculate_z_scores(values: &[f64], expected: &[f64], sds: &[f64]) -> Result<Vec<f64>> {
    ensure_same_len("value/expected", values.len(), expected.len())?;
    ensure_same_len("value/sd", values.len(), sds.len())?;
    Ok(values
        .iter()
        .zip(expected)
        .zip(sds)
        .map(|((&v, &e), &s)| calculate_z_score(v, e, s))
        .collect())
}

/// Number of scores with `|z| > threshold`. `NaN` scores never count.
pub fn count_outliers(z_scores: &[f64], threshold: f64) -> usize {
    stats::count_where(z_scores, |z| z.abs() > threshold)
}

/// Outlier counts for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZScoreSummary {
    /// Element label.
    pub element: String,
    /// Defined (non-`NaN`) scores.
    pub samples: usize,
    /// Scores with `|z| > 2`.
    #[serde(rename = "outliers2SD")]
    pub outliers_2sd: usize,
    /// `100 · outliers_2sd / samples`; `NaN` without samples.
    #[serde(rename = "rate2SD", deserialize_with = "nan_or_f64")]
    pub rate_2sd: f64,
    /// Scores with `|z| > 3`.
    #[serde(rename = "outliers3SD")]
    pub outliers_3sd: usize,
    /// `100 · outliers_3sd / samples`; `NaN` without samples.
    #[serde(rename = "rate3SD", deserialize_with = "nan_or_f64")]
    pub rate_3sd: f64,
}

/// Counts outliers beyond 2 and 3 standard deviations.
///
/// `NaN` scores are excluded from the sample count; rates are `NaN` when no
/// score is defined.
pub fn z_score_summary(element: &str, z_scores: &[f64]) -> ZScoreSummary {
    let valid: Vec<f64> = z_scores.iter().copied().filter(|z| !z.is_nan()).collect();
    let outliers_2sd = count_outliers(&valid, 2.0);
    let outliers_3sd = count_outliers(&valid, 3.0);
    ZScoreSummary {
        element: element.to_string(),
        samples: valid.len(),
        outliers_2sd,
        rate_2sd: stats::rate_percent(outliers_2sd, valid.len()),
        outliers_3sd,
        rate_3sd: stats::rate_percent(outliers_3sd, valid.len()),
    }
}

/// One reference-material result before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZScoreInput {
    /// Result date, if known.
    pub date: Option<NaiveDateTime>,
    /// Measured value.
    pub value: f64,
    /// Certified value.
    pub expected: f64,
    /// Certified standard deviation.
    pub sd: f64,
    /// Reference material name.
    pub crm: Option<String>,
    /// Reporting lab or company.
    pub company: Option<String>,
}

/// A scored point on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZScorePoint {
    /// Position in date order.
    pub index: usize,
    /// Result date, if known.
    pub date: Option<NaiveDateTime>,
    /// Measured value.
    pub value: f64,
    /// Certified value.
    pub expected: f64,
    /// Certified standard deviation.
    pub sd: f64,
    /// `(value − expected) / sd`; `NaN` when `sd == 0`.
    #[serde(deserialize_with = "nan_or_f64")]
    pub z_score: f64,
    /// Reference material name.
    pub crm: Option<String>,
    /// Reporting lab or company.
    pub company: Option<String>,
    /// `|z| > 2`.
    #[serde(rename = "isOutlier2SD")]
    pub is_outlier_2sd: bool,
    /// `|z| > 3`.
    #[serde(rename = "isOutlier3SD")]
    pub is_outlier_3sd: bool,
}

/// Scores results and orders them by date.
///
/// Inputs are stably sorted ascending by date (undated results first) and
/// indexed `0..n` in that order. The input slice is left untouched.
pub fn z_score_chart_data(inputs: &[ZScoreInput]) -> Vec<ZScorePoint> {
    let mut sorted: Vec<&ZScoreInput> = inputs.iter().collect();
    sorted.sort_by_key(|p| p.date);
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, p)| {
            let z_score = calculate_z_score(p.value, p.expected, p.sd);
            ZScorePoint {
                index,
                date: p.date,
                value: p.value,
                expected: p.expected,
                sd: p.sd,
                z_score,
                crm: p.crm.clone(),
                company: p.company.clone(),
                is_outlier_2sd: z_score.abs() > 2.0,
                is_outlier_3sd: z_score.abs() > 3.0,
            }
        })
        .collect()
}
