//! Runs several King Markov walkers in parallel with progress bars, then reports convergence
//! diagnostics and the pooled visit frequencies.

use king_markov::core::ChainRunner;
use king_markov::islands::{stationary, Proportional};
use king_markov::metropolis::{init_starts, KingMarkov};
use king_markov::stats::{total_variation, visit_frequencies};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    const ISLANDS: usize = 10;
    const N_CHAINS: usize = 4;
    const N_COLLECT: usize = 50_000;
    const N_DISCARD: usize = 1_000;
    const SEED: u64 = 42;

    env_logger::init();

    let starts = init_starts(N_CHAINS, ISLANDS, SEED);
    println!("Starting islands: {starts:?}");

    let mut kings = KingMarkov::new(&Proportional, ISLANDS, &starts)?.set_seed(SEED);
    let (sample, run_stats) = kings.run_progress(N_COLLECT, N_DISCARD)?;
    println!("{run_stats}");

    let pooled: Vec<usize> = sample.iter().copied().collect();
    let freq = visit_frequencies(&pooled, ISLANDS)?;
    let target = stationary(&Proportional, ISLANDS)?;
    for (i, (f, t)) in freq.iter().zip(&target).enumerate() {
        println!("island {:2}: observed {f:.4}, expected {t:.4}", i + 1);
    }
    println!("Total variation: {:.4}", total_variation(&freq, &target)?);

    #[cfg(feature = "csv")]
    {
        king_markov::io::csv::save_csv(&sample, "/tmp/king_markov_chains.csv")?;
        println!("Saved trajectories to /tmp/king_markov_chains.csv");
    }
    Ok(())
}
