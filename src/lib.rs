//! # qaqc-analytics
//!
//! Quality-assurance / quality-control statistics for mining assay data:
//! certified reference material (CRM) control charts, blank contamination,
//! duplicate precision (HARD), Z-scores and check-assay comparisons.
//!
//! Analyzers operate on plain `f64` series and know nothing about files,
//! users or storage. [`dataset`] turns parsed CSV rows into those series and
//! runs the analyzers per group.
//!
//! ## Modules
//!
//! - [`stats`]: Descriptive statistics (mean, SD, percentile, correlation, rolling mean)
//! - [`cleaning`]: Raw cell to number / date conversion (`"<0.01"`, `"1,250"`)
//! - [`crm`]: CRM control chart: bounds, bias, failures, moving mean
//! - [`blanks`]: Blank contamination against scalar or per-sample limits
//! - [`duplicates`]: HARD index, type thresholds, ranked and scatter chart data
//! - [`zscore`]: Z-scores, 2σ/3σ outlier counts, control lines
//! - [`check_assay`]: Paired descriptive statistics, scatter and Q-Q data
//! - [`chart`]: Warning (2σ) and action (3σ) bounds shared by the charts
//! - [`dataset`]: Column mapping, filtering, grouping and per-group runners
//!
//! ## Conventions
//!
//! - **Undefined is `NaN`**: empty series, zero variance and zero
//!   denominators produce `NaN` metrics, never errors. JSON output writes
//!   them as `null`.
//! - **Invalid input is an error**: mismatched parallel arrays, bad
//!   percentiles, bad windows, bad options and unmapped columns return
//!   [`AnalysisError`].
//! - **Failures are derived**: every `is_failure` flag is recomputed from the
//!   metric and its bound, never stored on its own.

pub mod blanks;
pub mod chart;
pub mod check_assay;
pub mod cleaning;
pub mod crm;
pub mod dataset;
pub mod duplicates;
pub mod error;
mod json;
pub mod stats;
pub mod zscore;

pub use error::{AnalysisError, Result};
