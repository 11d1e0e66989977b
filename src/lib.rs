//! # King Markov
//!
//! A compact Rust library simulating **King Markov's island tour**: a discrete-state
//! **Metropolis** random walk over a ring of islands whose long-run visit frequencies are
//! proportional to each island's population.
//!
//! ## Getting Started
//!
//! The library offers two ways to walk:
//! 1. [`metropolis::run`]: one seeded walk, returning the island occupied each week.
//! 2. [`metropolis::KingMarkov`]: many independent walkers run in parallel via
//!    [`core::ChainRunner`], with burn-in and optional progress bars.
//!
//! Populations are anything implementing [`islands::IslandWeight`], including plain closures.
//!
//! ## Example: the worked example
//!
//! ```rust
//! use king_markov::islands::Proportional;
//! use king_markov::metropolis::run;
//! use king_markov::stats::visit_frequencies;
//!
//! // 10 islands, island k has population k, start on island 10.
//! let weeks = run(100_000, 10, 10, &Proportional, 42).unwrap();
//! let freq = visit_frequencies(&weeks, 10).unwrap();
//!
//! // Island 10 should be visited about 10/55 of the time.
//! assert!((freq[9] - 10.0 / 55.0).abs() < 0.01);
//! ```
//!
//! ## Example: parallel walkers with diagnostics
//!
//! ```rust
//! use king_markov::core::ChainRunner;
//! use king_markov::islands::Proportional;
//! use king_markov::metropolis::{init_starts, KingMarkov};
//! use king_markov::stats::RunStats;
//!
//! let starts = init_starts(4, 10, 7);
//! let mut kings = KingMarkov::new(&Proportional, 10, &starts).unwrap().set_seed(42);
//! let sample = kings.run(2_000, 200).unwrap();
//!
//! let stats = RunStats::from(sample.view());
//! println!("{stats}");
//! assert_eq!(sample.shape(), &[4, 2_000]);
//! ```
//!
//! ## Features
//!
//! - `csv`: enables [`io::csv`] for exporting trajectories and visit tallies.

pub mod core;
pub mod error;
pub mod io;
pub mod islands;
pub mod metropolis;
pub mod stats;

pub use error::DomainError;
