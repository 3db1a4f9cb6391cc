//! Error type shared by every analyzer.
//!
//! Only invalid *input* is reported as an error: mismatched parallel arrays,
//! out-of-range percentiles, bad window sizes, bad options and unmapped
//! columns. Degenerate *data* (empty series, zero variance, zero
//! denominators) is never an error and surfaces as `NaN` in the results.

use thiserror::Error;

/// Errors returned when an analysis call is made with invalid arguments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Two arrays that must be paired index-by-index differ in length.
    #[error("{context}: expected {expected} values, got {actual}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Percentile argument outside `[0, 100]`.
    #[error("percentile must be between 0 and 100, got {0}")]
    PercentileOutOfRange(f64),

    /// Rolling window is zero or longer than the series.
    #[error("invalid window size {window} for a series of length {len}")]
    InvalidWindow { window: usize, len: usize },

    /// An option record failed validation.
    #[error("invalid option `{field}`: {reason}")]
    InvalidOption {
        field: &'static str,
        reason: String,
    },

    /// A column role required by the analysis is not mapped.
    #[error("column role `{0}` is not mapped")]
    MissingColumn(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Ensures `actual` matches `expected`, naming the pairing in the error.
pub(crate) fn ensure_same_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(AnalysisError::LengthMismatch {
            context,
            expected,
            actual,
        })
    }
}
