//! Gripper-action relabeling.
//!
//! Robot datasets encode gripper commands in several conventions: continuous
//! absolute positions, crisp binary open/close, and relative open/close
//! deltas. The converters here move between those conventions with stateful
//! scans over the per-trajectory action sequence, carrying the running
//! gripper state across steps that carry no information of their own.
//!
//! | Function | Scan | Input convention | Output |
//! |----------|------|------------------|--------|
//! | [`binarize_gripper_actions`] | backward | continuous `[0, 1]` | binary `{0, 1}` |
//! | [`rel2abs_gripper_actions`] | forward | relative deltas | absolute `{0, 1}` |
//! | [`rel_open_or_closed`] | backward | relative deltas | initial state scalar |
//! | [`invert_gripper_actions`] | - | any | elementwise complement |
//!
//! [`relabel_actions_from_proprio`] additionally rewrites position actions
//! from the proprioceptive state actually reached at the next timestep.

use ndarray::{concatenate, s, Array1, Array2, Axis};

use crate::error::{PrepError, Result};
use crate::trajectory::Trajectory;

/// Continuous values above this count as a fully open gripper.
pub const DEFAULT_OPEN_BOUNDARY: f64 = 0.95;

/// Continuous values below this count as a fully closed gripper.
pub const DEFAULT_CLOSE_BOUNDARY: f64 = 0.05;

/// Convert continuous gripper actions to binary values (0 and 1) using the
/// default open/close boundaries.
///
/// See [`binarize_gripper_actions_with`].
pub fn binarize_gripper_actions(actions: &Array1<f64>) -> Array1<f64> {
    binarize_gripper_actions_with(actions, DEFAULT_OPEN_BOUNDARY, DEFAULT_CLOSE_BOUNDARY)
}

/// Convert continuous gripper actions to binary values (0 and 1).
///
/// Most of the time the gripper sits fully open (near 1.0) or fully closed
/// (near 0.0); while transitioning it passes through a few intermediate
/// values. Those intermediate values are relabeled from the state reached
/// *after* them: the sequence is scanned backward, each crisp element resets
/// the carry to its own 0/1 value, and each ambiguous element copies the
/// carry unchanged.
///
/// If the trajectory ends in a run of intermediate values, no crisp state
/// ever seeds that run; it inherits the carry derived from the final element
/// (1 only when that element is above `open_boundary`). There is no further
/// recovery for this case.
pub fn binarize_gripper_actions_with(
    actions: &Array1<f64>,
    open_boundary: f64,
    close_boundary: f64,
) -> Array1<f64> {
    let n = actions.len();
    let mut out = Array1::zeros(n);
    if n == 0 {
        return out;
    }

    let mut carry = if actions[n - 1] > open_boundary { 1.0 } else { 0.0 };
    for i in (0..n).rev() {
        let open = actions[i] > open_boundary;
        let closed = actions[i] < close_boundary;
        if open || closed {
            carry = if open { 1.0 } else { 0.0 };
        }
        out[i] = carry;
    }
    out
}

/// Convert relative gripper actions to absolute open/closed actions
/// (0 closed, 1 open).
///
/// Relative actions above 0.1 mean "closing", below -0.1 "opening", and
/// anything in between "no change". Internally each step is thresholded with
/// the inverted sign convention opening -> +1, closing -> -1, so the running
/// state is the post-event gripper state. The scan starts from the state
/// implied *before* the first event (`-thresholded[first nonzero]`): a first
/// event that closes the gripper implies it started open, and vice versa.
/// With no event anywhere the gripper is assumed open for the whole
/// trajectory. Assumes the first relative action is not redundant (no close
/// command on an already-closed gripper).
pub fn rel2abs_gripper_actions(actions: &Array1<f64>) -> Array1<f64> {
    // opening -> +1, closing -> -1, no change -> 0
    let thresholded: Vec<i32> = actions
        .iter()
        .map(|&a| {
            if a < -0.1 {
                1
            } else if a > 0.1 {
                -1
            } else {
                0
            }
        })
        .collect();

    let start = thresholded
        .iter()
        .find(|&&t| t != 0)
        .map(|&t| -t)
        .unwrap_or(0);
    let start = if start == 0 { 1 } else { start };

    let mut out = Array1::zeros(actions.len());
    let mut carry = start;
    for (i, &t) in thresholded.iter().enumerate() {
        if t != 0 {
            carry = t;
        }
        // rescale {-1, 1} to {0, 1}
        out[i] = carry as f64 / 2.0 + 0.5;
    }
    out
}

/// Return the initial absolute gripper state implied by a relative-action
/// sequence (1 open, 0 closed).
///
/// The state mask collapses BOTH opening (`> 1e-3`) and closing (`< -1e-3`)
/// events to -1, so any thresholded action reads back as 0 (closed) through
/// the `(mask + 1) / 2` conversion, and a trajectory with no event at all
/// falls through to the default carry of 0 as well. This default disagrees
/// with [`rel2abs_gripper_actions`], which assumes open when no event
/// exists; both behaviors are kept exactly as-is.
pub fn rel_open_or_closed(actions: &Array1<f64>) -> f64 {
    let mut carry = 0.0;
    for &a in actions.iter().rev() {
        let mask = if a > 1e-3 {
            -1.0
        } else if a < -1e-3 {
            -1.0
        } else {
            0.0
        };
        if mask != 0.0 {
            carry = (mask + 1.0) / 2.0;
        }
    }
    carry
}

/// Elementwise complement: swaps the open/closed encoding.
pub fn invert_gripper_actions(actions: &Array1<f64>) -> Array1<f64> {
    actions.mapv(|a| 1.0 - a)
}

/// Relabel position actions from the proprioceptive state actually reached.
///
/// The first 6 action dimensions (xyz position, xyz rotation) become the
/// finite difference `state[t + 1, :6] - state[t, :6]`; the last timestep of
/// every field is dropped (no next state exists to relabel it), and the
/// original action's final dimension (the gripper command) is carried over
/// at the surviving indices.
///
/// Errors when the trajectory has no `observation.state`, when the state has
/// fewer than 6 columns, or when the action has no columns at all. A
/// trajectory with fewer than 2 timesteps yields an empty (0-timestep)
/// trajectory rather than an error.
pub fn relabel_actions_from_proprio(traj: &Trajectory) -> Result<Trajectory> {
    let state = traj.observation.state.as_ref().ok_or(PrepError::MissingState)?;
    if state.ncols() < 6 {
        return Err(PrepError::FieldTooNarrow {
            field: "observation.state".to_string(),
            cols: state.ncols(),
            needed: 6,
        });
    }
    let action_dims = traj.action.ncols();
    if action_dims == 0 {
        return Err(PrepError::FieldTooNarrow {
            field: "action".to_string(),
            cols: 0,
            needed: 1,
        });
    }

    let t = traj.num_timesteps();
    let keep = t.saturating_sub(1);

    let movement: Array2<f64> = if t >= 2 {
        &state.slice(s![1.., ..6]) - &state.slice(s![..t - 1, ..6])
    } else {
        Array2::zeros((0, 6))
    };
    let gripper = traj.action.slice(s![..keep, action_dims - 1..]).to_owned();

    let mut relabeled = traj.truncate(keep);
    relabeled.action = concatenate![Axis(1), movement, gripper];
    Ok(relabeled)
}
