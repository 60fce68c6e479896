//! Preprocessing configuration management.
//!
//! A single serializable struct captures everything the preprocessing stage
//! needs: which proprio fields participate, the normalization scheme, cache
//! behavior, and the dataset mixture with its thread budget. Configurations
//! load from TOML or JSON, validate before use, and version-control cleanly
//! for experiment reproducibility.
//!
//! # Example
//!
//! ```ignore
//! use trajectory_preprocessor::config::PreprocessConfig;
//!
//! let config = PreprocessConfig::load_toml("configs/bridge.toml")?;
//!
//! // Layer a sweep-specific overlay on a base configuration.
//! let config = PreprocessConfig::load_json_with_overlay(
//!     "configs/base.json",
//!     "configs/sweep_bounds.json",
//! )?;
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::preprocessing::NormalizationScheme;
use crate::tree::tree_merge;

/// One dataset in the training mixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureComponent {
    /// Dataset name (doubles as a hash dependency for the statistics cache).
    pub name: String,

    /// Non-negative sampling weight, relative to the rest of the mixture.
    pub weight: f64,
}

/// Unified preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Primary dataset name, used in cache fingerprints.
    pub dataset_name: String,

    /// Observation fields to include in statistics and normalization.
    #[serde(default)]
    pub proprio_keys: Vec<String>,

    /// Fields excluded from normalization entirely.
    #[serde(default)]
    pub skip_norm_keys: Vec<String>,

    /// Normalization scheme for action and proprio fields.
    #[serde(default)]
    pub normalization: NormalizationScheme,

    /// Recompute statistics even when a cache file exists.
    #[serde(default)]
    pub force_recompute: bool,

    /// Directory for statistics cache files; the per-user cache directory is
    /// used as fallback when absent or unwritable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_dir: Option<PathBuf>,

    /// Total loader-thread budget across the mixture. Absent means every
    /// loader tunes itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_budget: Option<usize>,

    /// Datasets in the mixture with their sampling weights.
    #[serde(default)]
    pub mixture: Vec<MixtureComponent>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            dataset_name: "dataset".to_string(),
            proprio_keys: vec!["state".to_string()],
            skip_norm_keys: Vec::new(),
            normalization: NormalizationScheme::default(),
            force_recompute: false,
            statistics_dir: None,
            thread_budget: None,
            mixture: Vec::new(),
        }
    }
}

impl PreprocessConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.dataset_name.is_empty() {
            return Err("dataset_name must not be empty".to_string());
        }
        for component in &self.mixture {
            if component.weight < 0.0 {
                return Err(format!(
                    "Mixture weight for {} is negative ({})",
                    component.name, component.weight
                ));
            }
        }
        if let Some(budget) = self.thread_budget {
            if !self.mixture.is_empty() && budget < self.mixture.len() {
                return Err(format!(
                    "thread_budget ({}) is smaller than the mixture size ({})",
                    budget,
                    self.mixture.len()
                ));
            }
        }
        for key in &self.skip_norm_keys {
            if key != "action" && !self.proprio_keys.contains(key) {
                return Err(format!(
                    "skip_norm_keys entry {} is not a normalized field",
                    key
                ));
            }
        }
        Ok(())
    }

    /// The cache fingerprint inputs this configuration implies: everything
    /// that changes the computed statistics.
    pub fn hash_dependencies(&self) -> Vec<String> {
        let mut deps = vec![self.dataset_name.clone()];
        deps.extend(self.proprio_keys.iter().cloned());
        deps
    }

    /// Mixture names and weights as parallel vectors.
    pub fn mixture_weights(&self) -> (Vec<String>, Vec<f64>) {
        let names = self.mixture.iter().map(|c| c.name.clone()).collect();
        let weights = self.mixture.iter().map(|c| c.weight).collect();
        (names, weights)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: PreprocessConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: PreprocessConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a base JSON configuration with a JSON overlay deep-merged on
    /// top. Overlay values win; nested objects merge key by key.
    pub fn load_json_with_overlay<P: AsRef<Path>, Q: AsRef<Path>>(
        base: P,
        overlay: Q,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let base_value: serde_json::Value = serde_json::from_str(&fs::read_to_string(base)?)?;
        let overlay_value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(overlay)?)?;
        let config: PreprocessConfig =
            serde_json::from_value(tree_merge(base_value, overlay_value))?;
        config.validate()?;
        Ok(config)
    }
}
