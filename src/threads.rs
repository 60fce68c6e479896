//! Thread allocation across dataset loaders.
//!
//! A data mixture interleaves several datasets, each read by its own pool of
//! loader threads. [`allocate_threads`] splits an integer thread budget
//! across the mixture proportionally to the sampling weights while
//! guaranteeing that every dataset with nonzero weight keeps at least one
//! thread - a tiny dataset starved of threads would stall the whole
//! interleave.
//!
//! The output is advisory: values are handed to an external loading pipeline
//! as its degree of parallelism. Nothing here spawns or manages threads.
//!
//! # Example
//!
//! ```ignore
//! use trajectory_preprocessor::threads::{allocate_threads, ThreadCount};
//!
//! let allocation = allocate_threads(Some(48), &[0.6, 0.3, 0.1])?;
//! // -> [Fixed(29), Fixed(14), Fixed(5)], summing to exactly 48
//!
//! let auto = allocate_threads(None, &[0.6, 0.4])?;
//! // -> [Auto, Auto]: let the runtime tune each loader dynamically
//! ```

use crate::error::{PrepError, Result};

/// Advisory degree of parallelism for one dataset loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadCount {
    /// Let the runtime choose dynamically.
    Auto,
    /// Use exactly this many threads.
    Fixed(usize),
}

impl ThreadCount {
    /// The fixed thread count, if one was allocated.
    pub fn fixed(&self) -> Option<usize> {
        match self {
            Self::Auto => None,
            Self::Fixed(n) => Some(*n),
        }
    }

    /// Whether the runtime should tune this loader itself.
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

/// Allocate an integer number of threads across datasets based on weights.
///
/// With a budget `n`, the result sums to exactly `n` and every entry with
/// nonzero weight receives at least 1; zero-weight entries may receive 0.
/// Without a budget, every dataset gets [`ThreadCount::Auto`].
///
/// Preconditions (hard errors): no negative weights, a budget of at least
/// `weights.len()`, and a nonzero weight sum.
///
/// The split first force-assigns 1 thread to every nonzero-weight entry
/// whose proportional share would round below 1, renormalizing the rest and
/// repeating until stable; the remaining shares are floored, and leftover
/// threads go to the largest fractional remainders, ties to the lower
/// original index.
pub fn allocate_threads(n: Option<usize>, weights: &[f64]) -> Result<Vec<ThreadCount>> {
    let Some(budget) = n else {
        return Ok(vec![ThreadCount::Auto; weights.len()]);
    };

    for (index, &weight) in weights.iter().enumerate() {
        if weight < 0.0 {
            return Err(PrepError::NegativeWeight { index, weight });
        }
    }
    if budget < weights.len() {
        return Err(PrepError::ThreadBudgetTooSmall {
            budget,
            datasets: weights.len(),
        });
    }
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Err(PrepError::ZeroWeightSum);
    }

    let mut weights: Vec<f64> = weights.iter().map(|w| w / total).collect();
    let mut allocation = vec![0usize; weights.len()];
    let mut remaining = budget;

    // Give every entry that would round below 1 its guaranteed thread, then
    // redistribute what is left over the rest.
    loop {
        let forced: Vec<usize> = (0..weights.len())
            .filter(|&i| weights[i] > 0.0 && weights[i] * (remaining as f64) < 1.0)
            .collect();
        if forced.is_empty() {
            break;
        }
        remaining -= forced.len();
        for &i in &forced {
            allocation[i] += 1;
            weights[i] = 0.0;
        }
        let rest: f64 = weights.iter().sum();
        if rest == 0.0 {
            break;
        }
        for w in weights.iter_mut() {
            *w /= rest;
        }
    }

    // Floor the proportional shares, then spend the leftover threads on the
    // largest fractional remainders (ties to the lower index).
    let mut fractional = vec![0.0; weights.len()];
    let mut floored = 0usize;
    for i in 0..weights.len() {
        let share = weights[i] * remaining as f64;
        let floor = share.floor() as usize;
        allocation[i] += floor;
        floored += floor;
        fractional[i] = share - floor as f64;
    }

    let leftover = remaining - floored;
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| fractional[b].total_cmp(&fractional[a]));
    for &i in order.iter().take(leftover) {
        allocation[i] += 1;
    }

    Ok(allocation.into_iter().map(ThreadCount::Fixed).collect())
}

/// Log a banner summarizing the datasets in a mixture and their sampling
/// weights.
pub fn log_data_mixture(names: &[String], weights: &[f64]) {
    let mut lines = Vec::with_capacity(names.len() + 3);
    let rule = "#".repeat(86);
    lines.push(rule.clone());
    lines.push(format!(
        "# Loading the following {} datasets (incl. sampling weight):{: >24} #",
        names.len(),
        ""
    ));
    for (name, weight) in names.iter().zip(weights) {
        let pad = 80usize.saturating_sub(name.len());
        lines.push(format!("# {}: {:=>pad$.6} #", name, weight, pad = pad));
    }
    lines.push(rule);
    log::info!("\n{}", lines.join("\n"));
}
