//! Action and proprio normalization from dataset statistics.
//!
//! Trajectory fields are rescaled with previously computed
//! [`DatasetStatistics`](crate::statistics::DatasetStatistics), per one of
//! two schemes:
//!
//! ## Normal (zero mean, unit variance)
//!
//! ```text
//! normalized = (x - mean) / (std + 1e-8)
//! ```
//!
//! Standard ML preprocessing; values are interpretable as standard
//! deviations from the dataset mean.
//!
//! ## Bounds (percentile box to [-1, 1])
//!
//! ```text
//! normalized = clamp(2 * (x - p01) / (p99 - p01 + 1e-8) - 1, -1, 1)
//! ```
//!
//! Uses the 1st/99th percentiles rather than min/max so a handful of
//! outliers cannot crush the usable range; everything past the percentile
//! box saturates at the clamp.
//!
//! Both schemes honor an optional per-dimension `mask` in the statistics
//! record: masked-out dimensions pass through untouched (a gripper dimension
//! that is already binary, say). A missing mask means every dimension is
//! transformed.
//!
//! The scheme set is closed: [`NormalizationScheme`] deserializes only
//! `"normal"` and `"bounds"`, so unknown schemes are rejected at the
//! configuration boundary instead of deep inside the pipeline.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::statistics::{DatasetStatistics, FieldStatistics};
use crate::trajectory::Trajectory;

/// Numerical guard against zero-width distributions.
const NORM_EPS: f64 = 1e-8;

/// Supported normalization schemes for action and proprio fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationScheme {
    /// Normalize to mean 0, std 1.
    #[default]
    Normal,
    /// Normalize to [-1, 1] via the 1st/99th percentile box.
    Bounds,
}

/// Normalize the action and the configured proprioceptive fields of a
/// trajectory using previously computed dataset statistics.
///
/// `proprio_keys` selects observation fields (with `"state"` resolving to
/// the dedicated state field); keys listed in `skip_norm_keys` are excluded
/// entirely. A field named in `proprio_keys` but absent from the trajectory
/// is skipped; a field with no statistics record is a hard error, as is a
/// statistics record whose dimensionality disagrees with the field.
pub fn normalize_action_and_proprio(
    traj: &Trajectory,
    statistics: &DatasetStatistics,
    scheme: NormalizationScheme,
    proprio_keys: &[String],
    skip_norm_keys: &[String],
) -> Result<Trajectory> {
    let mut keys: Vec<&str> = vec!["action"];
    keys.extend(proprio_keys.iter().map(String::as_str));
    keys.retain(|key| !skip_norm_keys.iter().any(|skip| skip.as_str() == *key));

    let mut normalized = traj.clone();
    for key in keys {
        let field_stats = statistics
            .field(key)
            .ok_or_else(|| PrepError::MissingStatistics {
                key: key.to_string(),
            })?;
        let array = if key == "action" {
            Some(&mut normalized.action)
        } else {
            normalized.observation.field_mut(key)
        };
        let Some(array) = array else {
            continue;
        };
        apply_scheme(key, array, field_stats, scheme)?;
    }
    Ok(normalized)
}

/// Rescale one `[T, dims]` array in place.
fn apply_scheme(
    key: &str,
    array: &mut Array2<f64>,
    stats: &FieldStatistics,
    scheme: NormalizationScheme,
) -> Result<()> {
    let dims = array.ncols();
    if stats.dims() != dims {
        return Err(PrepError::DimensionMismatch {
            key: key.to_string(),
            expected: stats.dims(),
            actual: dims,
        });
    }

    for (dim, mut column) in array.columns_mut().into_iter().enumerate() {
        if !stats.mask.as_ref().map(|m| m[dim]).unwrap_or(true) {
            continue;
        }
        match scheme {
            NormalizationScheme::Normal => {
                let mean = stats.mean[dim];
                let std = stats.std[dim];
                column.mapv_inplace(|x| (x - mean) / (std + NORM_EPS));
            }
            NormalizationScheme::Bounds => {
                let p01 = stats.p01[dim];
                let p99 = stats.p99[dim];
                column.mapv_inplace(|x| {
                    (2.0 * (x - p01) / (p99 - p01 + NORM_EPS) - 1.0).clamp(-1.0, 1.0)
                });
            }
        }
    }
    Ok(())
}

/// Invert a normalization, mapping model-space values back to raw units.
///
/// The exact inverse of the un-clamped formulas: values a `Bounds`
/// normalization saturated at the clamp cannot be recovered, but anything
/// inside the percentile box round-trips within floating tolerance. The
/// statistics `mask` is honored the same way as during normalization.
pub fn denormalize_array(
    array: &Array2<f64>,
    stats: &FieldStatistics,
    scheme: NormalizationScheme,
) -> Result<Array2<f64>> {
    let dims = array.ncols();
    if stats.dims() != dims {
        return Err(PrepError::DimensionMismatch {
            key: "denormalize".to_string(),
            expected: stats.dims(),
            actual: dims,
        });
    }

    let mut out = array.clone();
    for (dim, mut column) in out.columns_mut().into_iter().enumerate() {
        if !stats.mask.as_ref().map(|m| m[dim]).unwrap_or(true) {
            continue;
        }
        match scheme {
            NormalizationScheme::Normal => {
                let mean = stats.mean[dim];
                let std = stats.std[dim];
                column.mapv_inplace(|x| x * (std + NORM_EPS) + mean);
            }
            NormalizationScheme::Bounds => {
                let p01 = stats.p01[dim];
                let p99 = stats.p99[dim];
                column.mapv_inplace(|x| p01 + (x + 1.0) * (p99 - p01 + NORM_EPS) / 2.0);
            }
        }
    }
    Ok(out)
}
