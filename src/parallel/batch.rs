//! Sharded Monte Carlo runs.
//!
//! Trials are split into contiguous shards; each shard compiles its own copy
//! of the setup and draws from its own RNG stream forked from the run seed, so
//! a run is reproducible for a given seed and shard count.

use rayon::prelude::*;

use crate::combat::{AttackSetup, CompiledSetup, Rng};
use crate::dice::ExpressionCompiler;
use crate::parallel::pool::WorkerPool;
use crate::simulator::{run_trials, Histogram, SimulationError};

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; later batches may be smaller.
///
/// # Example
/// ```
/// # use attack_odds::parallel::batch_ranges;
/// let ranges = batch_ranges(100, 4);
/// assert_eq!(ranges, vec![(0, 25), (25, 50), (50, 75), (75, 100)]);
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let size = base + if i < remainder { 1 } else { 0 };
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Run `iterations` trials split into `shards` shards on `pool` and merge the
/// shard histograms.
pub fn run_sharded(
    setup: &AttackSetup,
    iterations: u64,
    seed: u64,
    shards: usize,
    pool: &WorkerPool,
) -> Result<Histogram, SimulationError> {
    // Compile once up front so a bad setup fails before any thread starts.
    CompiledSetup::compile(setup, &mut ExpressionCompiler::new())?;

    let ranges = batch_ranges(iterations as usize, shards.max(1));
    let run = || {
        ranges
            .par_iter()
            .enumerate()
            .map(|(shard, (start, end))| {
                let compiled = CompiledSetup::compile(setup, &mut ExpressionCompiler::new())?;
                let mut rng = Rng::new(seed).fork(shard as u64);
                run_trials(&compiled, (end - start) as u64, &mut rng)
            })
            .collect::<Result<Vec<Histogram>, SimulationError>>()
    };

    let shard_histograms = match pool.install(run) {
        Ok(result) => result?,
        Err(err) => {
            tracing::warn!(error = %err, "could not build shard pool, running on global pool");
            run()?
        }
    };

    let mut merged = Histogram::new();
    for histogram in &shard_histograms {
        merged.merge(histogram);
    }
    tracing::debug!(
        shards = shard_histograms.len(),
        trials = merged.num_trials(),
        "merged shard histograms"
    );
    Ok(merged)
}
