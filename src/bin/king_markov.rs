//! Runs King Markov's tour from the worked example and prints what a notebook would plot:
//! the first weeks of the trajectory and a histogram of visits per island.

use king_markov::islands::{stationary, Proportional};
use king_markov::metropolis::run;
use king_markov::stats::{acceptance_rate, autocorrelation, total_variation, visit_counts};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    const WEEKS: usize = 100_000;
    const ISLANDS: usize = 10;
    const START: usize = 10;
    const SEED: u64 = 42;
    const SHOWN_WEEKS: usize = 100;
    const BAR_WIDTH: f64 = 50.0;

    env_logger::init();
    log::info!("Simulating {WEEKS} weeks on {ISLANDS} islands, starting at island {START}");

    let weeks = run(WEEKS, ISLANDS, START, &Proportional, SEED)?;

    println!("First {SHOWN_WEEKS} weeks:");
    for chunk in weeks[..SHOWN_WEEKS.min(weeks.len())].chunks(20) {
        let line: Vec<String> = chunk.iter().map(|k| format!("{k:2}")).collect();
        println!("  {}", line.join(" "));
    }

    let counts = visit_counts(&weeks, ISLANDS)?;
    let target = stationary(&Proportional, ISLANDS)?;
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1) as f64;
    let empirical: Vec<f64> = counts.iter().map(|&c| c as f64 / WEEKS as f64).collect();

    println!("\nVisits per island:");
    for (i, &c) in counts.iter().enumerate() {
        let bar = "#".repeat((c as f64 / max_count * BAR_WIDTH).round() as usize);
        println!(
            "  {:2} {:<50} {:6}  observed {:.4}  expected {:.4}",
            i + 1,
            bar,
            c,
            empirical[i],
            target[i]
        );
    }

    let rho = autocorrelation(&weeks, 10);
    log::debug!("Autocorrelation up to lag 10: {rho:?}");
    println!(
        "\np(move) = {:.3}, lag-1 autocorrelation = {:.3}, total variation to target = {:.4}",
        acceptance_rate(&weeks),
        rho.get(1).copied().unwrap_or(f64::NAN),
        total_variation(&empirical, &target)?
    );
    Ok(())
}
