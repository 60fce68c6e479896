//! Statistics cache protocol tests.
//!
//! The cache contract: a hit never touches the dataset, `force_recompute`
//! always does, and an unwritable save directory falls back to the local
//! cache directory.

use ndarray::array;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use trajectory_preprocessor::prelude::*;

fn dataset() -> InMemoryDataset {
    let traj = |offset: f64| {
        Trajectory::new(
            array![[offset, 1.0], [offset + 1.0, 2.0], [offset + 2.0, 3.0]],
            Observation {
                state: Some(array![[offset], [offset + 0.5], [offset + 1.0]]),
                proprio: Default::default(),
            },
        )
    };
    InMemoryDataset::new(vec![traj(0.0), traj(5.0)])
}

fn deps(tag: &str) -> Vec<String> {
    vec!["bridge".to_string(), tag.to_string()]
}

/// A dataset that must never be iterated; proves cache hits skip the scan.
struct ExplodingDataset;

impl TrajectoryDataset for ExplodingDataset {
    fn cardinality(&self) -> Cardinality {
        Cardinality::Finite(1)
    }

    fn trajectories(&self) -> Box<dyn Iterator<Item = Result<Trajectory>> + '_> {
        panic!("the dataset must not be iterated on a cache hit");
    }
}

#[test]
fn save_dir_gets_the_cache_file() {
    let save_dir = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());

    cache
        .get_statistics(
            &dataset(),
            &["state".to_string()],
            &deps("save-dir"),
            Some(save_dir.path()),
            false,
        )
        .unwrap();

    let file = save_dir
        .path()
        .join(StatisticsCache::cache_file_name(&deps("save-dir")));
    assert!(file.exists());
}

#[test]
fn cache_hit_skips_dataset_iteration() {
    let save_dir = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());

    let computed = cache
        .get_statistics(
            &dataset(),
            &["state".to_string()],
            &deps("hit"),
            Some(save_dir.path()),
            false,
        )
        .unwrap();

    // Same fingerprint, exploding dataset: must load without iterating.
    let loaded = cache
        .get_statistics(
            &ExplodingDataset,
            &["state".to_string()],
            &deps("hit"),
            Some(save_dir.path()),
            false,
        )
        .unwrap();
    assert_eq!(loaded, computed);
}

#[test]
fn fallback_path_is_probed_when_save_dir_has_no_file() {
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());

    // First run with no save_dir writes the fallback path.
    let computed = cache
        .get_statistics(&dataset(), &[], &deps("fallback-probe"), None, false)
        .unwrap();
    let fallback_file = fallback
        .path()
        .join(StatisticsCache::cache_file_name(&deps("fallback-probe")));
    assert!(fallback_file.exists());

    // A later run pointing at an empty save_dir still hits the fallback.
    let empty_save_dir = TempDir::new().unwrap();
    let loaded = cache
        .get_statistics(
            &ExplodingDataset,
            &[],
            &deps("fallback-probe"),
            Some(empty_save_dir.path()),
            false,
        )
        .unwrap();
    assert_eq!(loaded, computed);
}

#[test]
fn force_recompute_ignores_the_cache_file() {
    let save_dir = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());

    let file = save_dir
        .path()
        .join(StatisticsCache::cache_file_name(&deps("force")));

    // Seed the cache with a sentinel the recompute must overwrite.
    let mut sentinel = cache
        .get_statistics(
            &dataset(),
            &[],
            &deps("force"),
            Some(save_dir.path()),
            false,
        )
        .unwrap();
    sentinel.num_trajectories = 999;
    fs::write(&file, serde_json::to_string(&sentinel).unwrap()).unwrap();

    let recomputed = cache
        .get_statistics(
            &dataset(),
            &[],
            &deps("force"),
            Some(save_dir.path()),
            true,
        )
        .unwrap();
    assert_eq!(recomputed.num_trajectories, 2);

    // The overwritten file reflects the recomputation.
    let on_disk: DatasetStatistics =
        serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(on_disk.num_trajectories, 2);
}

#[test]
fn stale_fingerprint_returns_cached_statistics_verbatim() {
    // The hash is the only validity check: a cache file planted under the
    // right name is returned as-is, dataset content notwithstanding.
    let save_dir = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());

    let mut planted = cache
        .get_statistics(
            &dataset(),
            &[],
            &deps("planted"),
            Some(save_dir.path()),
            false,
        )
        .unwrap();
    planted.num_transitions = 12345;
    let file = save_dir
        .path()
        .join(StatisticsCache::cache_file_name(&deps("planted")));
    fs::write(&file, serde_json::to_string(&planted).unwrap()).unwrap();

    let loaded = cache
        .get_statistics(
            &dataset(),
            &[],
            &deps("planted"),
            Some(save_dir.path()),
            false,
        )
        .unwrap();
    assert_eq!(loaded.num_transitions, 12345);
}

#[cfg(unix)]
#[test]
fn unwritable_save_dir_falls_back_to_local_path() {
    use std::os::unix::fs::PermissionsExt;

    let save_dir = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path().join("nested"));

    fs::set_permissions(save_dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
    let result = cache.get_statistics(
        &dataset(),
        &[],
        &deps("readonly"),
        Some(save_dir.path()),
        false,
    );
    fs::set_permissions(save_dir.path(), fs::Permissions::from_mode(0o755)).unwrap();

    let stats = result.unwrap();
    assert_eq!(stats.num_trajectories, 2);

    let file_name = StatisticsCache::cache_file_name(&deps("readonly"));
    let fallback_file = fallback.path().join("nested").join(&file_name);
    let save_file = save_dir.path().join(&file_name);
    // Mode bits do not bind a privileged user; accept whichever path the
    // write landed on, but it must have landed somewhere.
    assert!(fallback_file.exists() || save_file.exists());
}

#[test]
fn nonexistent_save_dir_is_an_error() {
    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());
    let missing = PathBuf::from(fallback.path().join("does/not/exist"));

    let err = cache
        .get_statistics(
            &dataset(),
            &[],
            &deps("missing-dir"),
            Some(&missing),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, PrepError::Io(_)));
}

#[test]
fn json_dir_dataset_feeds_the_cache() {
    let data_dir = TempDir::new().unwrap();
    for (i, traj) in dataset().trajectories().enumerate() {
        let traj = traj.unwrap();
        fs::write(
            data_dir.path().join(format!("traj_{i}.json")),
            serde_json::to_string(&traj).unwrap(),
        )
        .unwrap();
    }

    let fallback = TempDir::new().unwrap();
    let cache = StatisticsCache::new(fallback.path());
    let from_files = cache
        .get_statistics(
            &JsonDirDataset::new(data_dir.path()),
            &["state".to_string()],
            &deps("json-dir"),
            None,
            false,
        )
        .unwrap();
    let from_memory = cache
        .get_statistics(
            &dataset(),
            &["state".to_string()],
            &deps("json-dir-mem"),
            None,
            false,
        )
        .unwrap();

    assert_eq!(from_files.action, from_memory.action);
    assert_eq!(from_files.num_transitions, from_memory.num_transitions);
}
