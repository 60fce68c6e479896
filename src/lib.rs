//! Trajectory Preprocessor
//!
//! Data-preprocessing utilities for robot-learning dataset pipelines.
//!
//! # Overview
//!
//! Robot-learning datasets arrive as trajectories - time-major bundles of
//! actions and observations - recorded under wildly different conventions.
//! Before training, every dataset in a mixture has to be brought onto a
//! common footing:
//!
//! - **Gripper relabeling**: convert continuous, binary, and relative
//!   gripper-action encodings into one convention, and relabel position
//!   actions from the proprio state the robot actually reached
//! - **Dataset statistics**: one sequential pass computing per-dimension
//!   mean/std/min/max/percentiles, cached on disk keyed by a SHA-256
//!   fingerprint so the pass happens once per dataset
//! - **Normalization**: rescale action and proprio fields from those
//!   statistics (`normal` or `bounds` scheme)
//! - **Thread allocation**: split an integer loader-thread budget across
//!   the mixture proportionally to sampling weights, minimum one thread
//!   per dataset
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    Trajectory Preprocessor                     │
//! ├────────────────────────────────────────────────────────────────┤
//! │  trajectory/     - trajectory model, padding, key sampling     │
//! │  dataset/        - dataset iteration seam (trait + impls)      │
//! │  preprocessing/  - gripper relabeling and normalization        │
//! │  statistics/     - cached full-dataset statistics              │
//! │  threads/        - loader-thread allocation                    │
//! │  config/         - serializable pipeline configuration        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use trajectory_preprocessor::prelude::*;
//!
//! let cache = StatisticsCache::with_default_dir();
//! let stats = cache.get_statistics(
//!     &dataset,
//!     &config.proprio_keys,
//!     &config.hash_dependencies(),
//!     config.statistics_dir.as_deref(),
//!     config.force_recompute,
//! )?;
//!
//! let normalized = normalize_action_and_proprio(
//!     &trajectory,
//!     &stats,
//!     config.normalization,
//!     &config.proprio_keys,
//!     &config.skip_norm_keys,
//! )?;
//! ```
//!
//! All components are single-threaded and synchronous; failures propagate
//! immediately as [`PrepError`]. The statistics pass is the only
//! long-running operation, and the cache amortizes it to once per dataset.

pub mod config;
pub mod dataset;
pub mod error;
pub mod preprocessing;
pub mod prelude;
pub mod statistics;
pub mod threads;
pub mod trajectory;
pub mod tree;

// Re-exports - Error handling
pub use error::{PrepError, Result};

// Re-exports - Data model
pub use trajectory::{
    filter_success, sample_match_keys_uniform, EpisodeMetadata, Observation, Trajectory,
};

// Re-exports - Dataset interface
pub use dataset::{Cardinality, InMemoryDataset, JsonDirDataset, TrajectoryDataset};

// Re-exports - Preprocessing
pub use preprocessing::{
    binarize_gripper_actions, binarize_gripper_actions_with, denormalize_array,
    invert_gripper_actions, normalize_action_and_proprio, rel2abs_gripper_actions,
    rel_open_or_closed, relabel_actions_from_proprio, NormalizationScheme,
};

// Re-exports - Statistics
pub use statistics::{DatasetStatistics, FieldStatistics, StatisticsCache};

// Re-exports - Thread allocation
pub use threads::{allocate_threads, log_data_mixture, ThreadCount};

// Re-exports - Configuration
pub use config::{MixtureComponent, PreprocessConfig};
