//! Dataset Statistics Tool
//!
//! Configuration-driven tool for computing (or refreshing) the cached
//! statistics of a trajectory dataset stored as one-JSON-per-trajectory
//! files.
//!
//! # Usage
//!
//! ```bash
//! # Compute or load cached statistics
//! cargo run --release --bin compute_statistics -- --config configs/bridge.toml --data data/bridge/
//!
//! # Ignore any cache file and recompute
//! cargo run --release --bin compute_statistics -- --config configs/bridge.toml --data data/bridge/ --force
//!
//! # Generate a sample configuration
//! cargo run --release --bin compute_statistics -- --generate-config bridge.toml
//! ```

use trajectory_preprocessor::prelude::*;

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} --config <config.toml> --data <trajectory_dir> [--force]", program);
    eprintln!("  {} --generate-config <path.toml>", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config    Preprocessing configuration (TOML)");
    eprintln!("  --data      Directory of *.json trajectory files");
    eprintln!("  --force     Recompute statistics even when a cache file exists");
}

fn generate_sample_config(path: &str) {
    let config = PreprocessConfig::default();
    match config.save_toml(path) {
        Ok(()) => println!("Wrote sample configuration to {}", path),
        Err(err) => {
            eprintln!("Error: could not write {}: {}", path, err);
            std::process::exit(1);
        }
    }
}

fn run(config_path: &str, data_dir: &str, force: bool) {
    let config = match PreprocessConfig::load_toml(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: could not load {}: {}", config_path, err);
            std::process::exit(1);
        }
    };

    if !config.mixture.is_empty() {
        let (names, weights) = config.mixture_weights();
        log_data_mixture(&names, &weights);
        match allocate_threads(config.thread_budget, &weights) {
            Ok(allocation) => log::info!("Loader thread allocation: {:?}", allocation),
            Err(err) => {
                eprintln!("Error: {}", err);
                std::process::exit(1);
            }
        }
    }

    let dataset = JsonDirDataset::new(data_dir);
    let cache = StatisticsCache::with_default_dir();
    let statistics = match cache.get_statistics(
        &dataset,
        &config.proprio_keys,
        &config.hash_dependencies(),
        config.statistics_dir.as_deref(),
        force || config.force_recompute,
    ) {
        Ok(statistics) => statistics,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    println!(
        "{}: {} trajectories, {} transitions, {} action dims",
        config.dataset_name,
        statistics.num_trajectories,
        statistics.num_transitions,
        statistics.action.dims(),
    );
    for (key, field) in &statistics.proprio {
        println!("  {}: {} dims", key, field.dims());
    }
}

fn main() {
    env_logger::init();

    // Simple argument parsing
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--generate-config" => {
            if args.len() < 3 {
                eprintln!("Error: --generate-config requires a path argument");
                std::process::exit(1);
            }
            generate_sample_config(&args[2]);
        }
        "--config" => {
            if args.len() < 5 || args[3] != "--data" {
                eprintln!("Error: --config requires a path and a --data directory");
                print_usage(&args[0]);
                std::process::exit(1);
            }
            let force = args.iter().any(|a| a == "--force");
            run(&args[2], &args[4], force);
        }
        "--help" | "-h" => {
            print_usage(&args[0]);
        }
        _ => {
            eprintln!("Unknown argument: {}", args[1]);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}
