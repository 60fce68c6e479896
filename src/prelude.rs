//! Prelude module for convenient imports.
//!
//! Re-exports the types and functions most pipelines touch:
//!
//! ```ignore
//! use trajectory_preprocessor::prelude::*;
//!
//! let config = PreprocessConfig::load_toml("configs/bridge.toml")?;
//! let cache = StatisticsCache::with_default_dir();
//! ```

pub use crate::config::{MixtureComponent, PreprocessConfig};
pub use crate::dataset::{Cardinality, InMemoryDataset, JsonDirDataset, TrajectoryDataset};
pub use crate::error::{PrepError, Result};
pub use crate::preprocessing::{
    binarize_gripper_actions, denormalize_array, invert_gripper_actions,
    normalize_action_and_proprio, rel2abs_gripper_actions, rel_open_or_closed,
    relabel_actions_from_proprio, NormalizationScheme,
};
pub use crate::statistics::{DatasetStatistics, FieldStatistics, StatisticsCache};
pub use crate::threads::{allocate_threads, log_data_mixture, ThreadCount};
pub use crate::trajectory::{
    filter_success, sample_match_keys_uniform, EpisodeMetadata, Observation, Trajectory,
};
