//! JSON helpers for persisted results.
//!
//! `serde_json` writes non-finite floats as `null`, but refuses to read
//! `null` back into an `f64`. Fields that may hold an undefined metric use
//! [`nan_or_f64`] so a stored result deserializes to the same shape.

use serde::{Deserialize, Deserializer};

/// Deserializes `null` as `NaN`.
pub(crate) fn nan_or_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
