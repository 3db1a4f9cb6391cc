//! Certified Reference Material (CRM) control charts.
//!
//! A CRM is inserted into the sample stream with a certified grade. Its
//! assays are plotted against warning (±2σ) and action (±3σ) bounds; values
//! beyond the action bounds are failures and the relative offset of the
//! sample mean from the certificate is the bias.
//!
//! # Algorithm
//!
//! 1. Sample mean x̄ and sample standard deviation s (ddof = 1) of the grades.
//! 2. Center = x̄ if `use_mean`, else the expected value.
//! 3. Spread = certificate SD if `use_expected_sd` and it is non-zero, else s.
//! 4. Bounds = center ± k·spread for k = 2 and k = 3 (configurable).
//! 5. Failure: value strictly outside the ±3σ bounds.
//! 6. Bias% = (x̄ / expected − 1) · 100, always from the sample mean.
//!
//! # Examples
//!
//! ```
//! use qaqc_analytics::crm::{crm_summary, CrmOptions};
//!
//! let grades = [1.02, 0.98, 1.01, 0.99, 1.35];
//! let summary = crm_summary(&grades, 1.0, &CrmOptions::default()).unwrap();
//! assert_eq!(summary.num_samples, 5);
//! assert!(summary.bias > 0.0);
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::chart::{Bounds, DEFAULT_MULTIPLIER_2SD, DEFAULT_MULTIPLIER_3SD};
use crate::cleaning::clean_numeric;
use crate::error::{ensure_same_len, AnalysisError, Result};
use crate::json::nan_or_f64;
use crate::stats;

/// Default trailing window for the moving-mean overlay.
pub const DEFAULT_MOVING_MEAN_WINDOW: usize = 7;

/// Options for a CRM analysis.
///
/// Field names follow the persisted draft format, so
/// `{"useMean": true, "multiplier3SD": 2.5}` deserializes with every other
/// field at its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrmOptions {
    /// Center the bounds on the sample mean instead of the expected value.
    pub use_mean: bool,
    /// Use the certificate standard deviation for the spread.
    #[serde(rename = "useExpectedSD")]
    pub use_expected_sd: bool,
    /// Certificate standard deviation.
    #[serde(rename = "expectedSD")]
    pub expected_sd: Option<f64>,
    /// Warning-bound multiplier, `2.0` by default.
    #[serde(rename = "multiplier2SD")]
    pub multiplier_2sd: f64,
    /// Action-bound multiplier, `3.0` by default.
    #[serde(rename = "multiplier3SD")]
    pub multiplier_3sd: f64,
    /// Window of the moving-mean overlay; `None` disables it.
    pub moving_mean_window: Option<usize>,
}

impl Default for CrmOptions {
    fn default() -> Self {
        Self {
            use_mean: false,
            use_expected_sd: false,
            expected_sd: None,
            multiplier_2sd: DEFAULT_MULTIPLIER_2SD,
            multiplier_3sd: DEFAULT_MULTIPLIER_3SD,
            moving_mean_window: Some(DEFAULT_MOVING_MEAN_WINDOW),
        }
    }
}

impl CrmOptions {
    /// Checks multipliers, certificate SD and window.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::InvalidOption`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, m) in [
            ("multiplier2SD", self.multiplier_2sd),
            ("multiplier3SD", self.multiplier_3sd),
        ] {
            if !m.is_finite() || m <= 0.0 {
                return Err(AnalysisError::InvalidOption {
                    field,
                    reason: format!("must be a positive number, got {m}"),
                });
            }
        }
        if let Some(sd) = self.expected_sd {
            if sd.is_infinite() || sd < 0.0 {
                return Err(AnalysisError::InvalidOption {
                    field: "expectedSD",
                    reason: format!("must be a non-negative number, got {sd}"),
                });
            }
        }
        if self.moving_mean_window == Some(0) {
            return Err(AnalysisError::InvalidOption {
                field: "movingMeanWindow",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The certificate SD if it should drive the spread.
    ///
    /// An absent, zero or `NaN` certificate SD falls back to the data SD.
    fn certificate_spread(&self) -> Option<f64> {
        if !self.use_expected_sd {
            return None;
        }
        self.expected_sd.filter(|sd| *sd != 0.0 && !sd.is_nan())
    }
}

/// Summary of one CRM group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmSummary {
    /// Valid (non-`NaN`) grade values.
    pub num_samples: usize,
    /// Mean of the valid grades.
    #[serde(deserialize_with = "nan_or_f64")]
    pub mean: f64,
    /// Certified value the grades are compared against.
    #[serde(deserialize_with = "nan_or_f64")]
    pub expected_value: f64,
    /// Sample standard deviation of the grades (ddof = 1).
    #[serde(deserialize_with = "nan_or_f64")]
    pub standard_deviation: f64,
    /// Values beyond the ±3σ bounds.
    pub num_outliers: usize,
    /// Bias in percent; `NaN` when the expected value is zero.
    #[serde(deserialize_with = "nan_or_f64")]
    pub bias: f64,
    /// Failure rate in percent; `NaN` when there are no samples.
    #[serde(deserialize_with = "nan_or_f64")]
    pub failure_rate: f64,
    /// Bounds used to flag outliers.
    pub bounds: Bounds,
    /// Smallest valid grade.
    #[serde(deserialize_with = "nan_or_f64")]
    pub min_value: f64,
    /// Largest valid grade.
    #[serde(deserialize_with = "nan_or_f64")]
    pub max_value: f64,
}

/// One point on a CRM control chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmPoint {
    /// Position among the valid samples (0-based).
    pub sequence: usize,
    /// Position in the input series.
    pub index: usize,
    /// Sample date, when dates are supplied.
    pub date: Option<NaiveDateTime>,
    /// Grade value.
    pub value: f64,
    /// Certified value; the same for every point of a group.
    #[serde(deserialize_with = "nan_or_f64")]
    pub expected_value: f64,
    /// Bounds the point is judged against.
    #[serde(flatten)]
    pub bounds: Bounds,
    /// Outside the action (3σ) bounds.
    pub is_failure: bool,
    /// Trailing moving mean; `None` until the window fills.
    pub moving_mean: Option<f64>,
}

/// Summary plus chart points of one CRM group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmAnalysis {
    /// Group summary.
    pub summary: CrmSummary,
    /// One point per valid grade.
    pub points: Vec<CrmPoint>,
}

/// Values outside a pair of bounds, with their positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureScan {
    /// Failing values, in input order.
    pub values: Vec<f64>,
    /// Input positions of `values`.
    pub indices: Vec<usize>,
}

/// Warning and action bounds around `center`.
///
/// Thin wrapper over [`Bounds::around`] kept for symmetry with the other
/// CRM functions.
pub fn calculate_bounds(
    center: f64,
    spread: f64,
    multiplier_2sd: f64,
    multiplier_3sd: f64,
) -> Bounds {
    Bounds::around(center, spread, multiplier_2sd, multiplier_3sd)
}

/// Bias in percent: `(mean / expected − 1) · 100`. `NaN` if `expected == 0`.
pub fn calculate_bias(mean: f64, expected: f64) -> f64 {
    if expected == 0.0 {
        return f64::NAN;
    }
    (mean / expected - 1.0) * 100.0
}

/// Values strictly above `upper` or strictly below `lower`.
pub fn detect_failures(values: &[f64], upper: f64, lower: f64) -> FailureScan {
    let mut scan = FailureScan::default();
    for (i, &v) in values.iter().enumerate() {
        if v > upper || v < lower {
            scan.values.push(v);
            scan.indices.push(i);
        }
    }
    scan
}

/// Computes the summary of one CRM group.
///
/// `NaN` grades are ignored. With fewer than two valid grades the standard
/// deviation is `NaN`; unless a certificate SD is used the bounds are then
/// `NaN` too and nothing is flagged.
///
/// # Errors
///
/// [`AnalysisError::InvalidOption`] if `options` fail validation.
pub fn crm_summary(
    grade_values: &[f64],
    expected_value: f64,
    options: &CrmOptions,
) -> Result<CrmSummary> {
    options.validate()?;
    let grades = clean_numeric(grade_values);

    let data_mean = stats::mean(&grades);
    let data_sd = stats::std_dev(&grades);

    let center = if options.use_mean { data_mean } else { expected_value };
    let spread = options.certificate_spread().unwrap_or(data_sd);
    let bounds = calculate_bounds(center, spread, options.multiplier_2sd, options.multiplier_3sd);

    let failures = detect_failures(&grades, bounds.upper_3sd, bounds.lower_3sd);

    Ok(CrmSummary {
        num_samples: grades.len(),
        mean: data_mean,
        expected_value,
        standard_deviation: data_sd,
        num_outliers: failures.values.len(),
        bias: calculate_bias(data_mean, expected_value),
        failure_rate: stats::rate_percent(failures.values.len(), grades.len()),
        bounds,
        min_value: stats::min(&grades),
        max_value: stats::max(&grades),
    })
}

/// Builds control-chart points for one CRM group.
///
/// One point per non-`NaN` grade, in input order. `dates`, when given, must
/// be parallel to `grade_values`. The moving mean runs over the valid grades;
/// a window longer than the series leaves it empty.
///
/// # Errors
///
/// [`AnalysisError::LengthMismatch`] if `dates` is not parallel to the grades.
pub fn crm_chart_data(
    grade_values: &[f64],
    dates: Option<&[Option<NaiveDateTime>]>,
    expected_value: f64,
    bounds: &Bounds,
    moving_mean_window: Option<usize>,
) -> Result<Vec<CrmPoint>> {
    if let Some(dates) = dates {
        ensure_same_len("grade/date", grade_values.len(), dates.len())?;
    }

    let valid: Vec<(usize, f64)> = grade_values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .collect();
    let values: Vec<f64> = valid.iter().map(|&(_, v)| v).collect();

    let moving = match moving_mean_window {
        Some(window) if window >= 1 && window <= values.len() => {
            stats::rolling_mean(&values, window)?
        }
        _ => vec![None; values.len()],
    };

    Ok(valid
        .iter()
        .zip(moving)
        .enumerate()
        .map(|(sequence, (&(index, value), moving_mean))| CrmPoint {
            sequence,
            index,
            date: dates.and_then(|d| d[index]),
            value,
            expected_value,
            bounds: *bounds,
            is_failure: bounds.is_beyond_3sd(value),
            moving_mean,
        })
        .collect())
}

/// Summary and chart points for one CRM group in one call.
///
/// # Errors
///
/// Invalid options or a `dates` slice that is not parallel to the grades.
pub fn analyze_crm(
    grade_values: &[f64],
    dates: Option<&[Option<NaiveDateTime>]>,
    expected_value: f64,
    options: &CrmOptions,
) -> Result<CrmAnalysis> {
    let summary = crm_summary(grade_values, expected_value, options)?;
    let points = crm_chart_data(
        grade_values,
        dates,
        expected_value,
        &summary.bounds,
        options.moving_mean_window,
    )?;
    tracing::debug!(
        samples = summary.num_samples,
        outliers = summary.num_outliers,
        bias = summary.bias,
        "CRM analysis complete"
    );
    Ok(CrmAnalysis { summary, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 5, d).and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    #[test]
    fn fractional_constant_grades_collapse_bounds() {
        let s = crm_summary(&[0.1, 0.1, 0.1], 0.1, &CrmOptions::default()).unwrap();
        assert_eq!(s.standard_deviation, 0.0);
        assert_eq!(s.mean, 0.1);
        assert_eq!(s.bounds.upper_3sd, 0.1);
        assert_eq!(s.bounds.lower_3sd, 0.1);
        assert_eq!(s.bounds.upper_2sd, 0.1);
        assert_eq!(s.bias, 0.0);
        assert_eq!(s.num_outliers, 0);
    }

    #[test]
    fn constant_grades_collapse_bounds() {
        let s = crm_summary(&[10.0, 10.0, 10.0, 10.0], 10.0, &CrmOptions::default()).unwrap();
        assert_eq!(s.num_samples, 4);
        assert_eq!(s.standard_deviation, 0.0);
        assert_eq!(s.bounds.upper_3sd, 10.0);
        assert_eq!(s.bounds.lower_3sd, 10.0);
        assert_eq!(s.bounds.upper_2sd, 10.0);
        assert_eq!(s.bias, 0.0);
        assert_eq!(s.num_outliers, 0);
        assert_eq!(s.failure_rate, 0.0);
    }

    #[test]
    fn bias_uses_sample_mean_regardless_of_centering() {
        let expected_centered = crm_summary(&[10.0, 20.0], 10.0, &CrmOptions::default()).unwrap();
        let mean_centered = crm_summary(
            &[10.0, 20.0],
            10.0,
            &CrmOptions {
                use_mean: true,
                ..CrmOptions::default()
            },
        )
        .unwrap();
        assert!((expected_centered.bias - 50.0).abs() < 1e-10);
        assert!((mean_centered.bias - 50.0).abs() < 1e-10);
        // centering differs
        let sd = 50.0_f64.sqrt();
        assert!((expected_centered.bounds.upper_3sd - (10.0 + 3.0 * sd)).abs() < 1e-10);
        assert!((mean_centered.bounds.upper_3sd - (15.0 + 3.0 * sd)).abs() < 1e-10);
    }

    #[test]
    fn certificate_sd_drives_spread() {
        let opts = CrmOptions {
            use_expected_sd: true,
            expected_sd: Some(0.5),
            ..CrmOptions::default()
        };
        let s = crm_summary(&[9.0, 10.0, 11.0, 12.0], 10.0, &opts).unwrap();
        assert!((s.bounds.upper_2sd - 11.0).abs() < 1e-12);
        assert!((s.bounds.upper_3sd - 11.5).abs() < 1e-12);
        assert!((s.bounds.lower_3sd - 8.5).abs() < 1e-12);
        // only 12.0 is beyond 11.5
        assert_eq!(s.num_outliers, 1);
        assert!((s.failure_rate - 25.0).abs() < 1e-12);
    }

    #[test]
    fn zero_certificate_sd_falls_back_to_data() {
        let opts = CrmOptions {
            use_expected_sd: true,
            expected_sd: Some(0.0),
            ..CrmOptions::default()
        };
        let s = crm_summary(&[9.0, 11.0], 10.0, &opts).unwrap();
        let sd = 2.0_f64.sqrt();
        assert!((s.bounds.upper_3sd - (10.0 + 3.0 * sd)).abs() < 1e-12);
    }

    #[test]
    fn certificate_sd_ignored_without_flag() {
        let opts = CrmOptions {
            expected_sd: Some(100.0),
            ..CrmOptions::default()
        };
        let s = crm_summary(&[9.0, 11.0], 10.0, &opts).unwrap();
        assert!(s.bounds.upper_3sd < 20.0);
    }

    #[test]
    fn custom_multipliers() {
        let opts = CrmOptions {
            multiplier_2sd: 1.0,
            multiplier_3sd: 1.5,
            ..CrmOptions::default()
        };
        let s = crm_summary(&[8.0, 12.0], 10.0, &opts).unwrap();
        let sd = 8.0_f64.sqrt();
        assert!((s.bounds.upper_2sd - (10.0 + sd)).abs() < 1e-12);
        assert!((s.bounds.lower_3sd - (10.0 - 1.5 * sd)).abs() < 1e-12);
    }

    #[test]
    fn single_sample_is_degenerate_not_error() {
        let s = crm_summary(&[10.0], 10.0, &CrmOptions::default()).unwrap();
        assert_eq!(s.num_samples, 1);
        assert!(s.standard_deviation.is_nan());
        assert!(s.bounds.upper_3sd.is_nan());
        assert_eq!(s.num_outliers, 0);
        assert_eq!(s.failure_rate, 0.0);
    }

    #[test]
    fn empty_group_has_nan_rate() {
        let s = crm_summary(&[], 10.0, &CrmOptions::default()).unwrap();
        assert_eq!(s.num_samples, 0);
        assert!(s.mean.is_nan());
        assert!(s.failure_rate.is_nan());
    }

    #[test]
    fn zero_expected_gives_nan_bias() {
        assert!(calculate_bias(1.0, 0.0).is_nan());
        assert!((calculate_bias(1.1, 1.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn nan_grades_are_ignored() {
        let s = crm_summary(&[10.0, f64::NAN, 10.0], 10.0, &CrmOptions::default()).unwrap();
        assert_eq!(s.num_samples, 2);
        assert_eq!(s.mean, 10.0);
    }

    #[test]
    fn detect_failures_reports_positions() {
        let scan = detect_failures(&[1.0, 5.0, -5.0, 3.0], 3.0, -3.0);
        assert_eq!(scan.values, vec![5.0, -5.0]);
        assert_eq!(scan.indices, vec![1, 2]);
    }

    #[test]
    fn options_validation() {
        let bad = CrmOptions {
            multiplier_3sd: 0.0,
            ..CrmOptions::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(AnalysisError::InvalidOption { field: "multiplier3SD", .. })
        ));
        let bad_window = CrmOptions {
            moving_mean_window: Some(0),
            ..CrmOptions::default()
        };
        assert!(crm_summary(&[1.0], 1.0, &bad_window).is_err());
        let bad_sd = CrmOptions {
            expected_sd: Some(-1.0),
            ..CrmOptions::default()
        };
        assert!(bad_sd.validate().is_err());
    }

    #[test]
    fn options_from_draft_json() {
        let opts: CrmOptions =
            serde_json::from_str(r#"{"useMean": true, "multiplier3SD": 2.5}"#).expect("parse");
        assert!(opts.use_mean);
        assert_eq!(opts.multiplier_3sd, 2.5);
        assert_eq!(opts.multiplier_2sd, 2.0);
        assert_eq!(opts.moving_mean_window, Some(7));
    }

    #[test]
    fn chart_points_flag_failures_and_keep_indices() {
        let grades = [10.0, f64::NAN, 10.2, 9.8, 14.0];
        let bounds = Bounds::around(10.0, 1.0, 2.0, 3.0);
        let pts = crm_chart_data(&grades, None, 10.0, &bounds, None).unwrap();
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[1].index, 2);
        assert_eq!(pts[1].sequence, 1);
        assert!(!pts[0].is_failure);
        assert!(pts[3].is_failure);
        assert!(pts.iter().all(|p| p.moving_mean.is_none()));
    }

    #[test]
    fn chart_points_moving_mean() {
        let grades = [1.0, 2.0, 3.0, 4.0];
        let bounds = Bounds::around(2.5, 1.0, 2.0, 3.0);
        let pts = crm_chart_data(&grades, None, 2.5, &bounds, Some(2)).unwrap();
        assert_eq!(pts[0].moving_mean, None);
        assert_eq!(pts[1].moving_mean, Some(1.5));
        assert_eq!(pts[3].moving_mean, Some(3.5));
    }

    #[test]
    fn oversized_moving_window_is_omitted() {
        let grades = [1.0, 2.0, 3.0];
        let bounds = Bounds::around(2.0, 1.0, 2.0, 3.0);
        let pts = crm_chart_data(&grades, None, 2.0, &bounds, Some(7)).unwrap();
        assert!(pts.iter().all(|p| p.moving_mean.is_none()));
    }

    #[test]
    fn chart_dates_must_be_parallel() {
        let bounds = Bounds::around(2.0, 1.0, 2.0, 3.0);
        let dates = [day(1)];
        let err = crm_chart_data(&[1.0, 2.0], Some(&dates), 2.0, &bounds, None).unwrap_err();
        assert!(matches!(err, AnalysisError::LengthMismatch { .. }));
    }

    #[test]
    fn analyze_attaches_dates() {
        let dates = [day(1), day(2), day(3)];
        let a = analyze_crm(&[1.0, 1.1, 0.9], Some(&dates), 1.0, &CrmOptions::default()).unwrap();
        assert_eq!(a.points.len(), 3);
        assert_eq!(a.points[2].date, day(3));
        assert_eq!(a.summary.num_samples, 3);
    }

    #[test]
    fn summary_json_round_trip_with_nan() {
        let s = crm_summary(&[10.0], 0.0, &CrmOptions::default()).unwrap();
        let json = serde_json::to_string(&s).expect("serialize");
        let back: CrmSummary = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.num_samples, 1);
        assert!(back.bias.is_nan());
        assert!(back.bounds.upper_2sd.is_nan());
    }
}
