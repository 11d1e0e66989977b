//! With equal populations every proposal is accepted, so the king performs an unbiased ±1 walk
//! around the ring. This demo shows the walk never stays put and how slowly it decorrelates.

use king_markov::islands::Uniform;
use king_markov::metropolis::run;
use king_markov::stats::{acceptance_rate, autocorrelation, visit_frequencies};

fn main() {
    let weeks = run(20_000, 10, 1, &Uniform(1.0), 7).expect("Expected valid walk configuration");

    println!("p(move) = {:.3}", acceptance_rate(&weeks));
    for (lag, rho) in autocorrelation(&weeks, 20).iter().enumerate().step_by(5) {
        println!("lag {lag:2}: {rho:.3}");
    }

    let freq = visit_frequencies(&weeks, 10).expect("Expected positions inside the ring");
    println!("Visit frequencies (each should be near 0.1): {freq:.3?}");
}
