//! Trajectory data model.
//!
//! A trajectory is one robot episode: a time-major bundle of actions,
//! observations, and episode metadata. Every field shares the same leading
//! (time) dimension; [`Trajectory::validate`] checks that invariant.
//!
//! # Layout
//!
//! | Field | Shape | Description |
//! |-------|-------|-------------|
//! | `action` | `[T, action_dims]` | Commanded actions per timestep |
//! | `observation.state` | `[T, state_dims]` | Proprioceptive robot state |
//! | `observation.proprio[key]` | `[T, dims]` | Additional proprio fields |
//! | `metadata.file_path` | `[T]` | Source file per timestep |
//!
//! # Example
//!
//! ```ignore
//! use trajectory_preprocessor::Trajectory;
//!
//! let traj = Trajectory::new(actions, observation);
//! traj.validate()?;
//!
//! // Drop the final timestep from every field.
//! let shorter = traj.truncate(traj.num_timesteps() - 1);
//! ```

use ahash::AHashMap;
use ndarray::{s, Array2};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{PrepError, Result};

/// Episode-level metadata carried alongside the time-major fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    /// Source file path, replicated per timestep.
    #[serde(default)]
    pub file_path: Vec<String>,
}

/// Observation fields of a trajectory.
///
/// `state` is the canonical proprioceptive state used for action relabeling;
/// any other proprioceptive field lives in `proprio` under its own key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Proprioceptive robot state, `[T, state_dims]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Array2<f64>>,

    /// Additional proprioceptive fields keyed by name, each `[T, dims]`.
    #[serde(default)]
    pub proprio: AHashMap<String, Array2<f64>>,
}

impl Observation {
    /// Look up an observation field by its logical key.
    ///
    /// `"state"` resolves to the dedicated state field; everything else is a
    /// `proprio` map lookup.
    pub fn field(&self, key: &str) -> Option<&Array2<f64>> {
        if key == "state" {
            self.state.as_ref()
        } else {
            self.proprio.get(key)
        }
    }

    /// Mutable variant of [`Observation::field`].
    pub fn field_mut(&mut self, key: &str) -> Option<&mut Array2<f64>> {
        if key == "state" {
            self.state.as_mut()
        } else {
            self.proprio.get_mut(key)
        }
    }

    /// Merge two observations, with `overlay` fields overriding `base`.
    pub fn merge(base: Observation, overlay: Observation) -> Observation {
        let mut merged = base;
        if overlay.state.is_some() {
            merged.state = overlay.state;
        }
        for (key, value) in overlay.proprio {
            merged.proprio.insert(key, value);
        }
        merged
    }
}

/// One robot episode: time-major actions, observations, and metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Commanded actions, `[T, action_dims]`.
    pub action: Array2<f64>,

    /// Observation fields.
    #[serde(default)]
    pub observation: Observation,

    /// Episode metadata, when the source provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EpisodeMetadata>,
}

impl Trajectory {
    /// Create a trajectory from its action matrix and observation.
    pub fn new(action: Array2<f64>, observation: Observation) -> Self {
        Self {
            action,
            observation,
            metadata: None,
        }
    }

    /// Attach episode metadata.
    pub fn with_metadata(mut self, metadata: EpisodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Number of timesteps (the shared leading dimension).
    pub fn num_timesteps(&self) -> usize {
        self.action.nrows()
    }

    /// Check that every field shares the leading time dimension.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let t = self.num_timesteps();
        if let Some(state) = &self.observation.state {
            if state.nrows() != t {
                return Err(format!(
                    "observation.state has {} timesteps, action has {}",
                    state.nrows(),
                    t
                ));
            }
        }
        for (key, value) in &self.observation.proprio {
            if value.nrows() != t {
                return Err(format!(
                    "observation.{} has {} timesteps, action has {}",
                    key,
                    value.nrows(),
                    t
                ));
            }
        }
        if let Some(metadata) = &self.metadata {
            if !metadata.file_path.is_empty() && metadata.file_path.len() != t {
                return Err(format!(
                    "metadata.file_path has {} entries, action has {} timesteps",
                    metadata.file_path.len(),
                    t
                ));
            }
        }
        Ok(())
    }

    /// Keep only the first `len` timesteps of every field.
    pub fn truncate(&self, len: usize) -> Trajectory {
        let len = len.min(self.num_timesteps());
        let clip = |arr: &Array2<f64>| arr.slice(s![..len, ..]).to_owned();
        Trajectory {
            action: clip(&self.action),
            observation: Observation {
                state: self.observation.state.as_ref().map(clip),
                proprio: self
                    .observation
                    .proprio
                    .iter()
                    .map(|(k, v)| (k.clone(), clip(v)))
                    .collect(),
            },
            metadata: self.metadata.as_ref().map(|m| EpisodeMetadata {
                file_path: m.file_path.iter().take(len).cloned().collect(),
            }),
        }
    }

    /// Build a padding trajectory with the same shapes: zeros for numeric
    /// fields, empty strings for path metadata.
    pub fn padding_like(&self) -> Trajectory {
        let zeros = |arr: &Array2<f64>| Array2::zeros(arr.dim());
        Trajectory {
            action: zeros(&self.action),
            observation: Observation {
                state: self.observation.state.as_ref().map(zeros),
                proprio: self
                    .observation
                    .proprio
                    .iter()
                    .map(|(k, v)| (k.clone(), zeros(v)))
                    .collect(),
            },
            metadata: self.metadata.as_ref().map(|m| EpisodeMetadata {
                file_path: vec![String::new(); m.file_path.len()],
            }),
        }
    }
}

// ============================================================================
// Key sampling
// ============================================================================

/// Sample uniformly among all map values whose key matches a glob template.
///
/// The template supports `*` (any run of characters) and `?` (any single
/// character). Matching keys are sorted before sampling so the candidate set
/// is deterministic regardless of map iteration order. Errors when nothing
/// matches.
pub fn sample_match_keys_uniform<'a, V>(
    fields: &'a AHashMap<String, V>,
    template: &str,
) -> Result<&'a V> {
    let pattern = glob_to_regex(template);
    let mut matches: Vec<(&String, &V)> =
        fields.iter().filter(|(k, _)| pattern.is_match(k)).collect();
    matches.sort_by(|a, b| a.0.cmp(b.0));

    if matches.is_empty() {
        return Err(PrepError::NoMatchingKey {
            template: template.to_string(),
        });
    }
    log::info!(
        "Sampling uniformly across keys: {:?}",
        matches.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>()
    );
    let index = if matches.len() > 1 {
        rand::thread_rng().gen_range(0..matches.len())
    } else {
        0
    };
    Ok(matches[index].1)
}

/// Translate a glob template (`*`, `?`) into an anchored regex.
fn glob_to_regex(template: &str) -> Regex {
    let escaped = regex::escape(template).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped)).unwrap()
}

// ============================================================================
// Success filtering
// ============================================================================

static SUCCESS_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Keep only trajectories whose source path contains a `success` segment.
///
/// Looks at the first `file_path` metadata entry; trajectories without
/// metadata are rejected.
pub fn filter_success(traj: &Trajectory) -> bool {
    let pattern = SUCCESS_PATTERN.get_or_init(|| Regex::new("^.*/success/.*$").unwrap());
    traj.metadata
        .as_ref()
        .and_then(|m| m.file_path.first())
        .map(|path| pattern.is_match(path))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_trajectory() -> Trajectory {
        let action = array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]];
        let state = array![[1.0], [2.0], [3.0]];
        let mut proprio = AHashMap::new();
        proprio.insert("joints".to_string(), array![[0.0], [0.1], [0.2]]);
        Trajectory::new(
            action,
            Observation {
                state: Some(state),
                proprio,
            },
        )
        .with_metadata(EpisodeMetadata {
            file_path: vec![
                "/data/run1/success/ep0".to_string(),
                "/data/run1/success/ep0".to_string(),
                "/data/run1/success/ep0".to_string(),
            ],
        })
    }

    #[test]
    fn validate_accepts_consistent_fields() {
        assert!(sample_trajectory().validate().is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_leading_dim() {
        let mut traj = sample_trajectory();
        traj.observation.state = Some(array![[1.0], [2.0]]);
        assert!(traj.validate().is_err());
    }

    #[test]
    fn truncate_drops_trailing_timesteps_everywhere() {
        let traj = sample_trajectory();
        let shorter = traj.truncate(2);
        assert_eq!(shorter.num_timesteps(), 2);
        assert_eq!(shorter.observation.state.as_ref().unwrap().nrows(), 2);
        assert_eq!(shorter.observation.proprio["joints"].nrows(), 2);
        assert_eq!(shorter.metadata.as_ref().unwrap().file_path.len(), 2);
        assert!(shorter.validate().is_ok());
    }

    #[test]
    fn truncate_beyond_length_is_identity() {
        let traj = sample_trajectory();
        assert_eq!(traj.truncate(10), traj);
    }

    #[test]
    fn padding_preserves_shapes() {
        let traj = sample_trajectory();
        let padding = traj.padding_like();
        assert_eq!(padding.action.dim(), traj.action.dim());
        assert!(padding.action.iter().all(|&x| x == 0.0));
        assert!(padding
            .metadata
            .as_ref()
            .unwrap()
            .file_path
            .iter()
            .all(|p| p.is_empty()));
    }

    #[test]
    fn merge_prefers_overlay_fields() {
        let mut base = Observation::default();
        base.proprio.insert("a".to_string(), array![[1.0]]);
        base.proprio.insert("b".to_string(), array![[2.0]]);

        let mut overlay = Observation::default();
        overlay.state = Some(array![[9.0]]);
        overlay.proprio.insert("b".to_string(), array![[5.0]]);

        let merged = Observation::merge(base, overlay);
        assert_eq!(merged.state, Some(array![[9.0]]));
        assert_eq!(merged.proprio["a"], array![[1.0]]);
        assert_eq!(merged.proprio["b"], array![[5.0]]);
    }

    #[test]
    fn sample_match_keys_single_match() {
        let mut fields = AHashMap::new();
        fields.insert("image_primary".to_string(), 1);
        fields.insert("depth_primary".to_string(), 2);
        let value = sample_match_keys_uniform(&fields, "image_*").unwrap();
        assert_eq!(*value, 1);
    }

    #[test]
    fn sample_match_keys_among_multiple() {
        let mut fields = AHashMap::new();
        fields.insert("image_0".to_string(), 10);
        fields.insert("image_1".to_string(), 20);
        fields.insert("state".to_string(), 30);
        let value = sample_match_keys_uniform(&fields, "image_*").unwrap();
        assert!(*value == 10 || *value == 20);
    }

    #[test]
    fn sample_match_keys_no_match_is_error() {
        let fields: AHashMap<String, i32> = AHashMap::new();
        let err = sample_match_keys_uniform(&fields, "image_*").unwrap_err();
        assert!(matches!(err, PrepError::NoMatchingKey { .. }));
    }

    #[test]
    fn glob_matching_is_anchored() {
        let mut fields = AHashMap::new();
        fields.insert("wrist_image_left".to_string(), 1);
        // "image_*" must not match a key that merely contains "image_".
        assert!(sample_match_keys_uniform(&fields, "image_*").is_err());
    }

    #[test]
    fn filter_success_matches_path_segment() {
        assert!(filter_success(&sample_trajectory()));

        let mut failed = sample_trajectory();
        failed.metadata = Some(EpisodeMetadata {
            file_path: vec!["/data/run1/failure/ep0".to_string(); 3],
        });
        assert!(!filter_success(&failed));
    }

    #[test]
    fn filter_success_without_metadata_is_false() {
        let mut traj = sample_trajectory();
        traj.metadata = None;
        assert!(!filter_success(&traj));
    }

    #[test]
    fn trajectory_json_round_trip() {
        let traj = sample_trajectory();
        let json = serde_json::to_string(&traj).unwrap();
        let parsed: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, traj);
    }
}
