//! Error types for the preprocessing pipeline.
//!
//! All failures are synchronous and propagate directly to the caller; there
//! is no retry machinery anywhere in this crate. Precondition violations
//! (bad weights, unbounded datasets, malformed trajectories) are permanent
//! caller errors. I/O and serialization failures wrap the underlying error.

use std::fmt;
use std::io;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Error type for preprocessing operations.
#[derive(Debug)]
pub enum PrepError {
    /// A sampling weight was negative.
    NegativeWeight {
        /// Index of the offending weight
        index: usize,
        /// The weight value
        weight: f64,
    },

    /// Every sampling weight was zero, so no proportional split exists.
    ZeroWeightSum,

    /// The thread budget is smaller than the number of datasets.
    ThreadBudgetTooSmall {
        /// Requested total thread budget
        budget: usize,
        /// Number of datasets competing for threads
        datasets: usize,
    },

    /// Statistics were requested over a dataset with infinite cardinality.
    InfiniteCardinality,

    /// Statistics were requested over a dataset that yielded no trajectories.
    EmptyDataset,

    /// A trajectory is missing its proprioceptive `state` field.
    MissingState,

    /// A trajectory field has fewer columns than the operation needs.
    FieldTooNarrow {
        /// Field name
        field: String,
        /// Columns present
        cols: usize,
        /// Columns required
        needed: usize,
    },

    /// A proprioceptive key named in the request is absent from a trajectory.
    MissingProprio {
        /// The requested observation key
        key: String,
    },

    /// No statistics record exists for a field selected for normalization.
    MissingStatistics {
        /// The logical field name
        key: String,
    },

    /// A statistics record's vectors do not match the field's dimensionality.
    DimensionMismatch {
        /// The logical field name
        key: String,
        /// Dimensions the statistics describe
        expected: usize,
        /// Dimensions the trajectory field has
        actual: usize,
    },

    /// A key-pattern lookup matched nothing.
    NoMatchingKey {
        /// The glob template that failed to match
        template: String,
    },

    /// Underlying filesystem failure.
    Io(io::Error),

    /// Underlying JSON (de)serialization failure.
    Json(serde_json::Error),
}

impl fmt::Display for PrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeWeight { index, weight } => {
                write!(f, "Sampling weight at index {} is negative ({})", index, weight)
            }
            Self::ZeroWeightSum => {
                write!(f, "Sampling weights sum to zero; proportional allocation is undefined")
            }
            Self::ThreadBudgetTooSmall { budget, datasets } => {
                write!(
                    f,
                    "Thread budget ({}) must be at least the number of datasets ({})",
                    budget, datasets
                )
            }
            Self::InfiniteCardinality => {
                write!(f, "Cannot compute dataset statistics for infinite datasets")
            }
            Self::EmptyDataset => {
                write!(f, "Cannot compute dataset statistics over zero trajectories")
            }
            Self::MissingState => {
                write!(f, "Trajectory observation has no `state` field")
            }
            Self::FieldTooNarrow { field, cols, needed } => {
                write!(
                    f,
                    "Trajectory field `{}` has {} columns, but at least {} are required",
                    field, cols, needed
                )
            }
            Self::MissingProprio { key } => {
                write!(f, "Trajectory observation has no `{}` field", key)
            }
            Self::MissingStatistics { key } => {
                write!(f, "No statistics record for field `{}`", key)
            }
            Self::DimensionMismatch { key, expected, actual } => {
                write!(
                    f,
                    "Statistics for `{}` describe {} dimensions, but the field has {}",
                    key, expected, actual
                )
            }
            Self::NoMatchingKey { template } => {
                write!(f, "No key matches template `{}`", template)
            }
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for PrepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PrepError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
