//! Statistics primitives shared by every analyzer.
//!
//! All functions take slices of finite values; callers strip `NaN` first
//! (see [`crate::cleaning::clean_numeric`]). Degenerate input yields `NaN`
//! rather than an error, so a summary built from an empty group still has
//! a well-defined shape. Only contract violations (percentile outside
//! `[0, 100]`, bad rolling window) are reported as [`AnalysisError`].
//!
//! # Examples
//!
//! ```
//! use qaqc_analytics::stats::{mean, percentile, standard_deviation};
//!
//! let data = [1.0, 2.0, 3.0, 4.0];
//! assert!((mean(&data) - 2.5).abs() < 1e-12);
//! assert!((percentile(&data, 50.0).unwrap() - 2.5).abs() < 1e-12);
//! assert!(standard_deviation(&data, 1) > 1.29);
//! ```

use crate::error::{AnalysisError, Result};

/// Arithmetic mean. `NaN` for an empty slice.
///
/// Accumulated relative to the first value, so a constant series returns
/// that value exactly.
pub fn mean(data: &[f64]) -> f64 {
    let Some(&shift) = data.first() else {
        return f64::NAN;
    };
    shift + data.iter().map(|&x| x - shift).sum::<f64>() / data.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
///
/// `sqrt(Σ(x - x̄)² / (n - ddof))`. Use `ddof = 1` for the sample standard
/// deviation and `ddof = 0` for the population one.
///
/// # Algorithm
///
/// Shifted data: deviations are taken from `x - x₀` rather than `x`, which
/// keeps the sum of squares small for large offsets and makes a constant
/// series exactly `0`.
///
/// # Returns
///
/// `NaN` when `data.len() <= ddof`.
pub fn standard_deviation(data: &[f64], ddof: usize) -> f64 {
    let n = data.len();
    if n <= ddof {
        return f64::NAN;
    }
    let shift = data[0];
    let offset = data.iter().map(|&x| x - shift).sum::<f64>() / n as f64;
    let sum_sq: f64 = data.iter().map(|&x| (x - shift - offset).powi(2)).sum();
    (sum_sq / (n - ddof) as f64).sqrt()
}

/// Sample standard deviation (`ddof = 1`).
pub fn std_dev(data: &[f64]) -> f64 {
    standard_deviation(data, 1)
}

/// Percentile by linear interpolation between closest ranks.
///
/// # Algorithm
///
/// Sort ascending, take the fractional rank `i = p/100 · (n-1)` and
/// interpolate between `sorted[floor(i)]` and `sorted[ceil(i)]`. This is the
/// "linear" method used by NumPy and pandas.
///
/// # Errors
///
/// [`AnalysisError::PercentileOutOfRange`] when `p` is not in `[0, 100]`.
///
/// # Returns
///
/// `NaN` for an empty slice.
///
/// # Examples
///
/// ```
/// use qaqc_analytics::stats::percentile;
///
/// let data = [4.0, 1.0, 3.0, 2.0];
/// assert!((percentile(&data, 0.0).unwrap() - 1.0).abs() < 1e-12);
/// assert!((percentile(&data, 50.0).unwrap() - 2.5).abs() < 1e-12);
/// assert!(percentile(&data, 120.0).is_err());
/// ```
pub fn percentile(data: &[f64], p: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&p) {
        return Err(AnalysisError::PercentileOutOfRange(p));
    }
    if data.is_empty() {
        return Ok(f64::NAN);
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(percentile_sorted(&sorted, p))
}

/// Percentile of an already sorted, non-empty slice. `p` must be in range.
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Median, i.e. the 50th percentile. `NaN` for an empty slice.
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, 50.0)
}

/// Pearson product-moment correlation coefficient.
///
/// r = Σ(x-x̄)(y-ȳ) / √(Σ(x-x̄)² · Σ(y-ȳ)²)
///
/// # Returns
///
/// `NaN` if the slices differ in length, have fewer than 2 elements, or
/// either variable has zero variance.
///
/// # References
///
/// Pearson (1895). "Note on regression and inheritance in the case of
/// two parents". Proceedings of the Royal Society of London, 58, 240–242.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n < 2 {
        return f64::NAN;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut numerator = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        numerator += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }

    let denominator = (denom_x * denom_y).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    numerator / denominator
}

/// Trailing moving mean with one output per input.
///
/// The first `window - 1` outputs are `None`; output `i` is the mean of
/// `data[i + 1 - window..=i]`.
///
/// # Errors
///
/// [`AnalysisError::InvalidWindow`] when `window` is zero or larger than
/// the series.
pub fn rolling_mean(data: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    if window == 0 || window > data.len() {
        return Err(AnalysisError::InvalidWindow {
            window,
            len: data.len(),
        });
    }
    Ok((0..data.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                Some(mean(&data[i + 1 - window..=i]))
            }
        })
        .collect())
}

/// Smallest value. `NaN` for an empty slice.
pub fn min(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Largest value. `NaN` for an empty slice.
pub fn max(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Number of values satisfying `predicate`.
pub fn count_where(data: &[f64], predicate: impl Fn(f64) -> bool) -> usize {
    data.iter().filter(|&&v| predicate(v)).count()
}

/// `100 · count / total`, or `NaN` when `total` is zero.
pub fn rate_percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return f64::NAN;
    }
    count as f64 / total as f64 * 100.0
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn std_dev_non_negative(
            data in proptest::collection::vec(-1e6_f64..1e6, 2..=60)
        ) {
            let sd = std_dev(&data);
            prop_assert!(sd >= 0.0, "sd = {sd}");
        }

        #[test]
        fn std_dev_of_constant_is_zero(c in -1e6_f64..1e6, n in 2usize..40) {
            let data = vec![c; n];
            prop_assert_eq!(std_dev(&data), 0.0);
            prop_assert_eq!(mean(&data), c);
        }

        #[test]
        fn percentile_endpoints_are_min_max(
            data in proptest::collection::vec(-1e6_f64..1e6, 1..=60)
        ) {
            prop_assert_eq!(percentile(&data, 0.0).unwrap(), min(&data));
            prop_assert_eq!(percentile(&data, 100.0).unwrap(), max(&data));
        }

        #[test]
        fn percentile_monotonic_in_p(
            data in proptest::collection::vec(-1e3_f64..1e3, 1..=40),
            p in 0.0_f64..=99.0
        ) {
            let lo = percentile(&data, p).unwrap();
            let hi = percentile(&data, p + 1.0).unwrap();
            prop_assert!(hi >= lo - 1e-9, "{hi} < {lo}");
        }

        #[test]
        fn correlation_bounded(
            pairs in proptest::collection::vec((-1e3_f64..1e3, -1e3_f64..1e3), 2..=40)
        ) {
            let (x, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let r = correlation(&x, &y);
            if !r.is_nan() {
                prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&r), "r = {r}");
            }
        }

        #[test]
        fn rolling_mean_shape(
            data in proptest::collection::vec(-1e3_f64..1e3, 1..=40),
            window in 1usize..=40
        ) {
            prop_assume!(window <= data.len());
            let out = rolling_mean(&data, window).unwrap();
            prop_assert_eq!(out.len(), data.len());
            prop_assert_eq!(out.iter().filter(|v| v.is_none()).count(), window - 1);
        }
    }
}
