//! Dataset statistics computation and caching.
//!
//! Normalization needs aggregate statistics (mean, std, bounds, percentiles)
//! over the action and proprioceptive fields of an entire dataset. Computing
//! them means a full sequential pass over every trajectory, so the result is
//! cached on disk, content-addressed by a SHA-256 fingerprint of
//! caller-supplied hash dependencies (dataset name, version, transform
//! configuration - whatever affects the result).
//!
//! # Cache protocol
//!
//! - File name: `dataset_statistics_{sha256hex}.json`
//! - Probe order: the caller's `save_dir` (when given), then the local
//!   fallback directory (`~/.cache/trajectory-preprocessor` by default)
//! - Writes go to `save_dir`; a permission failure there falls back to the
//!   local directory instead
//!
//! The fingerprint is the only validity check: a hit is returned as-is, so
//! stale or mismatched hash dependencies silently return wrong statistics.
//! That is the documented contract - callers own the fingerprint. Concurrent
//! writers racing on one key are not locked against; the last writer wins.
//!
//! # Example
//!
//! ```ignore
//! use trajectory_preprocessor::{InMemoryDataset, StatisticsCache};
//!
//! let cache = StatisticsCache::with_default_dir();
//! let stats = cache.get_statistics(
//!     &dataset,
//!     &["state".to_string()],
//!     &[name, version, transform_id],
//!     Some(save_dir),
//!     false,
//! )?;
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dataset::{Cardinality, TrajectoryDataset};
use crate::error::{PrepError, Result};

/// Per-field aggregate statistics, elementwise over the field's last
/// dimension, aggregated over every timestep of every trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStatistics {
    /// Elementwise mean.
    pub mean: Vec<f64>,
    /// Elementwise population standard deviation.
    pub std: Vec<f64>,
    /// Elementwise maximum.
    pub max: Vec<f64>,
    /// Elementwise minimum.
    pub min: Vec<f64>,
    /// Elementwise 99th percentile.
    pub p99: Vec<f64>,
    /// Elementwise 1st percentile.
    pub p01: Vec<f64>,
    /// Optional per-dimension normalization mask. Never produced by
    /// computation; honored when present in a loaded cache file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<bool>>,
}

impl FieldStatistics {
    /// Dimensionality the statistics describe.
    pub fn dims(&self) -> usize {
        self.mean.len()
    }
}

/// Aggregate statistics for one dataset: the action field, every requested
/// proprioceptive field, and the dataset's size.
///
/// Serializes to a single flat JSON object - field records keyed by name at
/// the top level next to the scalar counts - matching the
/// `dataset_statistics_{hash}.json` cache format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    /// Statistics of the `action` field.
    pub action: FieldStatistics,
    /// Total number of timesteps across all trajectories.
    pub num_transitions: u64,
    /// Total number of trajectories.
    pub num_trajectories: u64,
    /// Statistics of each requested proprioceptive field, keyed by name.
    #[serde(flatten)]
    pub proprio: HashMap<String, FieldStatistics>,
}

impl DatasetStatistics {
    /// Look up the statistics record for a logical field name.
    pub fn field(&self, key: &str) -> Option<&FieldStatistics> {
        if key == "action" {
            Some(&self.action)
        } else {
            self.proprio.get(key)
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Computes dataset statistics, or loads them from a cache file written by a
/// previous run with the same hash dependencies.
#[derive(Debug, Clone)]
pub struct StatisticsCache {
    fallback_dir: PathBuf,
}

impl StatisticsCache {
    /// Create a cache with an explicit local fallback directory.
    ///
    /// Tests inject a temporary directory here; production callers normally
    /// use [`StatisticsCache::with_default_dir`].
    pub fn new<P: Into<PathBuf>>(fallback_dir: P) -> Self {
        Self {
            fallback_dir: fallback_dir.into(),
        }
    }

    /// Create a cache backed by `~/.cache/trajectory-preprocessor`.
    pub fn with_default_dir() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".cache").join("trajectory-preprocessor"))
    }

    /// The local fallback directory.
    pub fn fallback_dir(&self) -> &Path {
        &self.fallback_dir
    }

    /// Cache file name for a set of hash dependencies.
    pub fn cache_file_name(hash_dependencies: &[String]) -> String {
        let mut hasher = Sha256::new();
        for dep in hash_dependencies {
            hasher.update(dep.as_bytes());
        }
        let digest: [u8; 32] = hasher.finalize().into();
        let hex: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
        format!("dataset_statistics_{}.json", hex)
    }

    /// Compute the statistics of a dataset, or load them from a cache file
    /// if this has been done before with the same `hash_dependencies`.
    ///
    /// The fingerprint is the only validity check: the dataset content is
    /// never compared against a cache hit, so callers must fold everything
    /// that affects the result into `hash_dependencies`.
    ///
    /// Computing iterates the full dataset once, sequentially - a one-time
    /// cost amortized by the cache. Datasets reporting
    /// [`Cardinality::Infinite`] are rejected before iteration.
    pub fn get_statistics(
        &self,
        dataset: &dyn TrajectoryDataset,
        proprio_keys: &[String],
        hash_dependencies: &[String],
        save_dir: Option<&Path>,
        force_recompute: bool,
    ) -> Result<DatasetStatistics> {
        let file_name = Self::cache_file_name(hash_dependencies);
        let save_path = save_dir.map(|dir| dir.join(&file_name));
        let local_path = self.fallback_dir.join(&file_name);

        if !force_recompute {
            for path in save_path.iter().chain(std::iter::once(&local_path)) {
                if path.exists() {
                    log::info!("Loading existing dataset statistics from {}", path.display());
                    let contents = fs::read_to_string(path)?;
                    return Ok(serde_json::from_str(&contents)?);
                }
            }
        }

        let statistics = compute_dataset_statistics(dataset, proprio_keys)?;
        self.persist(&statistics, save_path.as_deref().unwrap_or(&local_path), &local_path)?;
        Ok(statistics)
    }

    /// Write the statistics to `target`, falling back to `local_path` when
    /// `target` is not writable. Only a permission failure triggers the
    /// fallback; any other I/O error, and any failure writing the fallback
    /// itself, propagates.
    fn persist(
        &self,
        statistics: &DatasetStatistics,
        target: &Path,
        local_path: &Path,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(statistics)?;
        match fs::write(target, &json) {
            Ok(()) => {
                log::info!("Wrote dataset statistics to {}", target.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                log::warn!(
                    "Could not write dataset statistics to {}. Writing to {} instead.",
                    target.display(),
                    local_path.display()
                );
                if let Some(parent) = local_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(local_path, &json)?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for StatisticsCache {
    fn default() -> Self {
        Self::with_default_dir()
    }
}

// ============================================================================
// Computation
// ============================================================================

/// One full sequential pass over the dataset, reducing the action field and
/// every requested proprioceptive field to per-timestep statistics.
fn compute_dataset_statistics(
    dataset: &dyn TrajectoryDataset,
    proprio_keys: &[String],
) -> Result<DatasetStatistics> {
    if matches!(dataset.cardinality(), Cardinality::Infinite) {
        return Err(PrepError::InfiniteCardinality);
    }

    log::info!(
        "Computing dataset statistics. This may take a while, but should only \
         need to happen once for each dataset."
    );

    let mut actions: Vec<Array2<f64>> = Vec::new();
    let mut proprios: HashMap<String, Vec<Array2<f64>>> = HashMap::new();
    let mut num_transitions: u64 = 0;
    let mut num_trajectories: u64 = 0;

    for traj in dataset.trajectories() {
        let traj = traj?;
        num_transitions += traj.action.nrows() as u64;
        num_trajectories += 1;
        for key in proprio_keys {
            let field = traj
                .observation
                .field(key)
                .ok_or_else(|| PrepError::MissingProprio { key: key.clone() })?;
            proprios.entry(key.clone()).or_default().push(field.clone());
        }
        actions.push(traj.action);
    }

    if num_trajectories == 0 || num_transitions == 0 {
        return Err(PrepError::EmptyDataset);
    }

    let action_stats = compute_field_statistics(&stack_rows("action", &actions)?);
    let mut proprio_stats = HashMap::new();
    for key in proprio_keys {
        let stacked = stack_rows(key, &proprios[key])?;
        proprio_stats.insert(key.clone(), compute_field_statistics(&stacked));
    }

    Ok(DatasetStatistics {
        action: action_stats,
        num_transitions,
        num_trajectories,
        proprio: proprio_stats,
    })
}

/// Stack per-trajectory `[T_i, dims]` arrays into one `[sum(T_i), dims]`
/// array, verifying a consistent trailing dimension.
fn stack_rows(key: &str, arrays: &[Array2<f64>]) -> Result<Array2<f64>> {
    let dims = arrays[0].ncols();
    for arr in arrays {
        if arr.ncols() != dims {
            return Err(PrepError::DimensionMismatch {
                key: key.to_string(),
                expected: dims,
                actual: arr.ncols(),
            });
        }
    }
    let total_rows: usize = arrays.iter().map(|arr| arr.nrows()).sum();
    let mut flat = Vec::with_capacity(total_rows * dims);
    for arr in arrays {
        flat.extend(arr.iter().copied());
    }
    Ok(Array2::from_shape_vec((total_rows, dims), flat).expect("row-major accumulation"))
}

/// Per-column statistics over a stacked `[N, dims]` array.
fn compute_field_statistics(data: &Array2<f64>) -> FieldStatistics {
    let dims = data.ncols();
    let mut stats = FieldStatistics {
        mean: Vec::with_capacity(dims),
        std: Vec::with_capacity(dims),
        max: Vec::with_capacity(dims),
        min: Vec::with_capacity(dims),
        p99: Vec::with_capacity(dims),
        p01: Vec::with_capacity(dims),
        mask: None,
    };

    for col in data.axis_iter(Axis(1)) {
        let mut sorted: Vec<f64> = col.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        stats.mean.push(mean);
        stats.std.push(variance.sqrt());
        stats.min.push(sorted[0]);
        stats.max.push(sorted[sorted.len() - 1]);
        stats.p01.push(quantile(&sorted, 0.01));
        stats.p99.push(quantile(&sorted, 0.99));
    }
    stats
}

/// Linearly interpolated quantile of pre-sorted values (numpy convention).
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemoryDataset;
    use crate::trajectory::{Observation, Trajectory};
    use ndarray::array;

    fn dataset_fixture() -> InMemoryDataset {
        let first = Trajectory::new(
            array![[1.0, 10.0], [2.0, 20.0]],
            Observation {
                state: Some(array![[0.5], [1.5]]),
                proprio: Default::default(),
            },
        );
        let second = Trajectory::new(
            array![[3.0, 30.0], [4.0, 40.0]],
            Observation {
                state: Some(array![[2.5], [3.5]]),
                proprio: Default::default(),
            },
        );
        InMemoryDataset::new(vec![first, second])
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&sorted, 1.0) - 4.0).abs() < 1e-12);
        assert!((quantile(&sorted, 0.01) - 1.03).abs() < 1e-12);
        assert!((quantile(&sorted, 0.99) - 3.97).abs() < 1e-12);
    }

    #[test]
    fn field_statistics_per_column() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let stats = compute_field_statistics(&data);
        assert!((stats.mean[0] - 2.5).abs() < 1e-12);
        assert!((stats.mean[1] - 25.0).abs() < 1e-12);
        // Population std of [1, 2, 3, 4] is sqrt(1.25).
        assert!((stats.std[0] - 1.25_f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, vec![1.0, 10.0]);
        assert_eq!(stats.max, vec![4.0, 40.0]);
        assert!((stats.p01[0] - 1.03).abs() < 1e-12);
        assert!((stats.p99[0] - 3.97).abs() < 1e-12);
        assert!(stats.mask.is_none());
    }

    #[test]
    fn statistics_aggregate_across_trajectories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatisticsCache::new(dir.path());
        let stats = cache
            .get_statistics(
                &dataset_fixture(),
                &["state".to_string()],
                &["unit".to_string()],
                None,
                false,
            )
            .unwrap();

        assert_eq!(stats.num_transitions, 4);
        assert_eq!(stats.num_trajectories, 2);
        assert!((stats.action.mean[0] - 2.5).abs() < 1e-12);
        assert!((stats.action.mean[1] - 25.0).abs() < 1e-12);
        let state = stats.field("state").unwrap();
        assert!((state.mean[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn cache_format_is_flat_json() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatisticsCache::new(dir.path());
        let stats = cache
            .get_statistics(
                &dataset_fixture(),
                &["state".to_string()],
                &["flat".to_string()],
                None,
                false,
            )
            .unwrap();

        let value = serde_json::to_value(&stats).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("action"));
        assert!(object.contains_key("state"));
        assert!(object.contains_key("num_transitions"));
        assert!(object.contains_key("num_trajectories"));
    }

    #[test]
    fn statistics_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatisticsCache::new(dir.path());
        let stats = cache
            .get_statistics(
                &dataset_fixture(),
                &["state".to_string()],
                &["roundtrip".to_string()],
                None,
                false,
            )
            .unwrap();

        let json = serde_json::to_string(&stats).unwrap();
        let parsed: DatasetStatistics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }

    #[test]
    fn infinite_datasets_are_rejected() {
        struct InfiniteDataset;
        impl TrajectoryDataset for InfiniteDataset {
            fn cardinality(&self) -> Cardinality {
                Cardinality::Infinite
            }
            fn trajectories(&self) -> Box<dyn Iterator<Item = Result<Trajectory>> + '_> {
                Box::new(std::iter::empty())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let cache = StatisticsCache::new(dir.path());
        let err = cache
            .get_statistics(&InfiniteDataset, &[], &["inf".to_string()], None, false)
            .unwrap_err();
        assert!(matches!(err, PrepError::InfiniteCardinality));
    }

    #[test]
    fn empty_datasets_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatisticsCache::new(dir.path());
        let err = cache
            .get_statistics(
                &InMemoryDataset::new(Vec::new()),
                &[],
                &["empty".to_string()],
                None,
                false,
            )
            .unwrap_err();
        assert!(matches!(err, PrepError::EmptyDataset));
    }

    #[test]
    fn missing_proprio_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatisticsCache::new(dir.path());
        let err = cache
            .get_statistics(
                &dataset_fixture(),
                &["wrench".to_string()],
                &["missing".to_string()],
                None,
                false,
            )
            .unwrap_err();
        assert!(matches!(err, PrepError::MissingProprio { .. }));
    }

    #[test]
    fn distinct_dependencies_hash_to_distinct_files() {
        let a = StatisticsCache::cache_file_name(&["bridge".to_string(), "v1".to_string()]);
        let b = StatisticsCache::cache_file_name(&["bridge".to_string(), "v2".to_string()]);
        assert_ne!(a, b);
        assert!(a.starts_with("dataset_statistics_"));
        assert!(a.ends_with(".json"));
    }
}
