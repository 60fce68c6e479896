//! Dataset iteration interface.
//!
//! Statistics computation consumes datasets through the narrow
//! [`TrajectoryDataset`] trait: an iterable of trajectory records plus a
//! cardinality query. Two implementations ship with the crate:
//!
//! - [`InMemoryDataset`] - a finite vector of trajectories, the default for
//!   tests and small pipelines
//! - [`JsonDirDataset`] - reads `*.json` trajectory files from a directory
//!   in sorted order, used by the `compute_statistics` tool

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::trajectory::Trajectory;

/// Cardinality of a dataset, as reported by its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// The dataset yields exactly this many trajectories.
    Finite(u64),
    /// The size is not known ahead of iteration.
    Unknown,
    /// The dataset is an unbounded stream.
    Infinite,
}

/// An iterable source of trajectories with a cardinality query.
pub trait TrajectoryDataset {
    /// Report the dataset's cardinality without consuming it.
    fn cardinality(&self) -> Cardinality;

    /// Iterate the dataset's trajectories in source order.
    fn trajectories(&self) -> Box<dyn Iterator<Item = Result<Trajectory>> + '_>;
}

/// A finite dataset held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    trajectories: Vec<Trajectory>,
}

impl InMemoryDataset {
    /// Wrap a vector of trajectories.
    pub fn new(trajectories: Vec<Trajectory>) -> Self {
        Self { trajectories }
    }

    /// Number of trajectories held.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// Whether the dataset holds no trajectories.
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}

impl TrajectoryDataset for InMemoryDataset {
    fn cardinality(&self) -> Cardinality {
        Cardinality::Finite(self.trajectories.len() as u64)
    }

    fn trajectories(&self) -> Box<dyn Iterator<Item = Result<Trajectory>> + '_> {
        Box::new(self.trajectories.iter().cloned().map(Ok))
    }
}

/// A dataset of one-trajectory-per-file JSON documents in a directory.
///
/// Files are visited in sorted name order so iteration is reproducible.
#[derive(Debug, Clone)]
pub struct JsonDirDataset {
    dir: PathBuf,
}

impl JsonDirDataset {
    /// Point at a directory of `*.json` trajectory files.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn trajectory_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl TrajectoryDataset for JsonDirDataset {
    fn cardinality(&self) -> Cardinality {
        match self.trajectory_files() {
            Ok(files) => Cardinality::Finite(files.len() as u64),
            Err(_) => Cardinality::Unknown,
        }
    }

    fn trajectories(&self) -> Box<dyn Iterator<Item = Result<Trajectory>> + '_> {
        match self.trajectory_files() {
            Ok(files) => Box::new(files.into_iter().map(|path| -> Result<Trajectory> {
                let contents = fs::read_to_string(&path)?;
                Ok(serde_json::from_str(&contents)?)
            })),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn in_memory_cardinality_and_iteration() {
        let traj = Trajectory::new(array![[1.0], [2.0]], Default::default());
        let dataset = InMemoryDataset::new(vec![traj.clone(), traj]);
        assert_eq!(dataset.cardinality(), Cardinality::Finite(2));
        assert_eq!(dataset.trajectories().count(), 2);
    }

    #[test]
    fn json_dir_reads_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.json", 2.0), ("a.json", 1.0)] {
            let traj = Trajectory::new(array![[value]], Default::default());
            fs::write(
                dir.path().join(name),
                serde_json::to_string(&traj).unwrap(),
            )
            .unwrap();
        }
        // Non-JSON files are ignored.
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let dataset = JsonDirDataset::new(dir.path());
        assert_eq!(dataset.cardinality(), Cardinality::Finite(2));
        let trajs: Vec<Trajectory> = dataset
            .trajectories()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(trajs[0].action[[0, 0]], 1.0);
        assert_eq!(trajs[1].action[[0, 0]], 2.0);
    }

    #[test]
    fn json_dir_missing_directory_yields_error() {
        let dataset = JsonDirDataset::new("/nonexistent/trajectories");
        assert_eq!(dataset.cardinality(), Cardinality::Unknown);
        let first = dataset.trajectories().next().unwrap();
        assert!(first.is_err());
    }
}
