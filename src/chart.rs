//! Control bounds shared by the chart-producing analyzers.
//!
//! A QAQC control chart draws a center line with a warning band at ±2σ and an
//! action band at ±3σ. Only the action band decides failures; the warning
//! band is for display.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - Abzalov, M. (2008). "Quality Control of Assay Data: A Review of
//!   Procedures for Measuring and Monitoring Precision and Accuracy",
//!   *Exploration and Mining Geology* 17(3-4).

use serde::{Deserialize, Serialize};

use crate::json::nan_or_f64;

/// Default multiplier for the warning band.
pub const DEFAULT_MULTIPLIER_2SD: f64 = 2.0;

/// Default multiplier for the action band.
pub const DEFAULT_MULTIPLIER_3SD: f64 = 3.0;

/// Warning and action bounds around a center value.
///
/// # Invariants
///
/// When center and spread are finite, the spread is non-negative and
/// `multiplier_3sd >= multiplier_2sd`,
/// `lower_3sd <= lower_2sd <= upper_2sd <= upper_3sd`. A `NaN` spread makes
/// every bound `NaN`, in which case no value is ever outside them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Upper warning bound, `center + multiplier_2sd · spread`.
    #[serde(rename = "upper2SD", deserialize_with = "nan_or_f64")]
    pub upper_2sd: f64,
    /// Lower warning bound, `center − multiplier_2sd · spread`.
    #[serde(rename = "lower2SD", deserialize_with = "nan_or_f64")]
    pub lower_2sd: f64,
    /// Upper action bound, `center + multiplier_3sd · spread`.
    #[serde(rename = "upper3SD", deserialize_with = "nan_or_f64")]
    pub upper_3sd: f64,
    /// Lower action bound, `center − multiplier_3sd · spread`.
    #[serde(rename = "lower3SD", deserialize_with = "nan_or_f64")]
    pub lower_3sd: f64,
}

impl Bounds {
    /// `center ± multiplier · spread` for both tiers.
    pub fn around(center: f64, spread: f64, multiplier_2sd: f64, multiplier_3sd: f64) -> Self {
        Self {
            upper_2sd: center + multiplier_2sd * spread,
            lower_2sd: center - multiplier_2sd * spread,
            upper_3sd: center + multiplier_3sd * spread,
            lower_3sd: center - multiplier_3sd * spread,
        }
    }

    /// Strictly above the upper or below the lower action bound.
    ///
    /// Comparisons against `NaN` bounds are false, so undefined bounds never
    /// flag a failure.
    pub fn is_beyond_3sd(&self, value: f64) -> bool {
        value > self.upper_3sd || value < self.lower_3sd
    }

    /// Strictly outside the warning band.
    pub fn is_beyond_2sd(&self, value: f64) -> bool {
        value > self.upper_2sd || value < self.lower_2sd
    }

    /// Whether every bound is a finite number.
    pub fn is_defined(&self) -> bool {
        [self.upper_2sd, self.lower_2sd, self.upper_3sd, self.lower_3sd]
            .iter()
            .all(|b| b.is_finite())
    }
}
