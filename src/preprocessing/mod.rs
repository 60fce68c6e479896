//! Trajectory preprocessing transforms.
//!
//! Pure per-trajectory operations applied before batching:
//!
//! - **Gripper relabeling**: convert between continuous, binary, and
//!   relative gripper-action conventions with stateful backward/forward
//!   scans, and relabel position actions from the reached proprio state
//! - **Normalization**: rescale action and proprio fields from cached
//!   dataset statistics, per the `normal` or `bounds` scheme
//!
//! All transforms take a trajectory (or a 1-D action sequence) and return a
//! new value; nothing here touches disk or spawns threads.

pub mod gripper;
pub mod normalization;

pub use gripper::{
    binarize_gripper_actions, binarize_gripper_actions_with, invert_gripper_actions,
    rel2abs_gripper_actions, rel_open_or_closed, relabel_actions_from_proprio,
    DEFAULT_CLOSE_BOUNDARY, DEFAULT_OPEN_BOUNDARY,
};
pub use normalization::{denormalize_array, normalize_action_and_proprio, NormalizationScheme};
