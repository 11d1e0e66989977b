/*!
# Core chain utilities.

This module provides the machinery for running one or many Markov chains over a scalar state:
- The [`MarkovChain<T>`] trait, which abstracts a single chain.
- [`run_chain`] and [`run_chain_progress`] for executing a single chain and recording its
  trajectory.
- The [`HasChains<T>`] trait for types that own multiple chains.
- The [`ChainRunner<T>`] extension trait that runs all chains in parallel (using Rayon),
  discarding burn-in and optionally displaying progress bars.

Any type implementing [`HasChains<T>`] automatically implements [`ChainRunner<T>`].

Trajectories record the state a chain is in *before* each step, so the first recorded value of
a run without burn-in is the chain's starting state.
*/

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::{Array2, ShapeError};
use num_traits::ToPrimitive;
use rayon::prelude::*;
use std::error::Error;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crate::stats::{collect_rhat, ChainStats, ChainTracker, RunStats};

/// A single Markov chain over a scalar state.
pub trait MarkovChain<T> {
    /// Performs one transition and returns a reference to the new state.
    fn step(&mut self) -> &T;

    /// Returns the current state without advancing the chain.
    fn current_state(&self) -> &T;
}

/// Runs `chain` for `n_discard + n_collect` steps and returns the states entering the last
/// `n_collect` of them.
pub fn run_chain<T, M>(chain: &mut M, n_collect: usize, n_discard: usize) -> Vec<T>
where
    M: MarkovChain<T>,
    T: Clone,
{
    let mut out = Vec::with_capacity(n_collect);
    for i in 0..n_discard + n_collect {
        if i >= n_discard {
            out.push(chain.current_state().clone());
        }
        chain.step();
    }
    out
}

/// Same as [`run_chain`], but feeds every transition into a [`ChainTracker`] and sends its
/// statistics over `tx` at most once per second and once after the final step.
///
/// A closed receiver is not an error; the chain simply keeps running.
pub fn run_chain_progress<T, M>(
    chain: &mut M,
    n_collect: usize,
    n_discard: usize,
    tx: Sender<ChainStats>,
) -> Result<Vec<T>, String>
where
    M: MarkovChain<T>,
    T: Clone + ToPrimitive,
{
    let mut out = Vec::with_capacity(n_collect);
    let mut tracker = ChainTracker::new(chain.current_state());
    let mut last = Instant::now();
    let freq = Duration::from_secs(1);
    let total = n_discard + n_collect;

    for i in 0..total {
        if i >= n_discard {
            out.push(chain.current_state().clone());
        }
        let state = chain.step();
        tracker.step(state).map_err(|e| {
            format!(
                "Chain statistics tracker caused error: {}.\nAborting generation of further observations.",
                e
            )
        })?;

        let now = Instant::now();
        if now >= last + freq || i + 1 == total {
            if let Err(e) = tx.send(tracker.stats()) {
                log::trace!("Sending chain statistics failed: {e}");
            }
            last = now;
        }
    }
    Ok(out)
}

/// A type that owns multiple Markov chains.
pub trait HasChains<T> {
    type Chain: MarkovChain<T> + Send;

    /// Returns a mutable reference to the vector of chains.
    fn chains_mut(&mut self) -> &mut Vec<Self::Chain>;
}

/// Extension of [`HasChains<T>`] that runs all chains in parallel.
///
/// Both methods return a `(n_chains, n_collect)` array whose row `c` is chain `c`'s trajectory.
pub trait ChainRunner<T>: HasChains<T>
where
    T: Clone + PartialEq + Send + ToPrimitive,
{
    /// Runs all chains in parallel, discarding the first `n_discard` states (burn-in).
    fn run(&mut self, n_collect: usize, n_discard: usize) -> Result<Array2<T>, ShapeError> {
        let chains = self.chains_mut();
        log::debug!(
            "Running {} chains for {} steps ({} discarded)",
            chains.len(),
            n_collect + n_discard,
            n_discard
        );
        let n_chains = chains.len();
        let results: Vec<Vec<T>> = chains
            .par_iter_mut()
            .map(|chain| run_chain(chain, n_collect, n_discard))
            .collect();
        Array2::from_shape_vec((n_chains, n_collect), results.concat())
    }

    /// Runs all chains in parallel while rendering one progress bar per chain plus a global
    /// bar showing the average acceptance rate and the running R-hat.
    ///
    /// Returns the trajectories together with the [`RunStats`] of the collected sample.
    fn run_progress(
        &mut self,
        n_collect: usize,
        n_discard: usize,
    ) -> Result<(Array2<T>, RunStats), Box<dyn Error>> {
        let chains = self.chains_mut();
        let n_chains = chains.len();
        let total = n_collect + n_discard;
        if total == 0 || n_chains == 0 {
            let sample = Array2::from_shape_vec((n_chains, 0), vec![])?;
            let run_stats = RunStats::from(sample.view());
            return Ok((sample, run_stats));
        }

        let (txs, rxs): (Vec<Sender<ChainStats>>, Vec<Receiver<ChainStats>>) =
            (0..n_chains).map(|_| mpsc::channel()).unzip();
        let progress_handle = thread::spawn(move || show_progress(rxs, total as u64));

        let results: Vec<Result<Vec<T>, String>> = thread::scope(|s| {
            let handles: Vec<_> = chains
                .iter_mut()
                .zip(txs)
                .map(|(chain, tx)| {
                    s.spawn(move || run_chain_progress(chain, n_collect, n_discard, tx))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err("Chain thread panicked.".to_string()))
                })
                .collect()
        });

        if let Err(e) = progress_handle.join() {
            log::warn!("Progress bar thread emitted error message: {:?}", e);
        }

        let trajectories = results.into_iter().collect::<Result<Vec<Vec<T>>, String>>()?;
        let sample = Array2::from_shape_vec((n_chains, n_collect), trajectories.concat())?;
        let run_stats = RunStats::from(sample.view());
        log::info!("{run_stats}");
        Ok((sample, run_stats))
    }
}

impl<T: Clone + PartialEq + Send + ToPrimitive, R: HasChains<T>> ChainRunner<T> for R {}

/// Drives the progress display until every chain has hung up its sender.
fn show_progress(rxs: Vec<Receiver<ChainStats>>, total: u64) {
    let sleep = Duration::from_millis(250);
    let multi = MultiProgress::new();
    let pb_style = ProgressStyle::default_bar()
        .template("{prefix:8} {bar:40.cyan/blue} {pos}/{len} ({eta}) | {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");

    let global_pb = multi.add(ProgressBar::new(rxs.len() as u64 * total));
    global_pb.set_style(pb_style.clone());
    global_pb.set_prefix("Global");

    let chain_pbs: Vec<ProgressBar> = (0..rxs.len())
        .map(|i| {
            let pb = multi.add(ProgressBar::new(total));
            pb.set_style(pb_style.clone());
            pb.set_prefix(format!("Chain {i}"));
            pb
        })
        .collect();

    let mut most_recent: Vec<Option<ChainStats>> = vec![None; rxs.len()];
    let mut open = vec![true; rxs.len()];

    loop {
        for (i, rx) in rxs.iter().enumerate() {
            loop {
                match rx.try_recv() {
                    Ok(stats) => most_recent[i] = Some(stats),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        open[i] = false;
                        break;
                    }
                }
            }
        }

        let mut avg_p_accept = 0.0;
        let mut n_available = 0.0;
        for (pb, stats) in chain_pbs.iter().zip(&most_recent) {
            if let Some(stats) = stats {
                pb.set_position(stats.n);
                pb.set_message(format!("p(accept)≈{:.2}", stats.p_accept));
                avg_p_accept += stats.p_accept;
                n_available += 1.0;
            }
        }

        let valid: Vec<&ChainStats> = most_recent.iter().flatten().collect();
        global_pb.set_position(valid.iter().map(|s| s.n).sum());
        if n_available > 0.0 {
            avg_p_accept /= n_available;
            let rhat = collect_rhat(&valid);
            if rhat.is_finite() {
                global_pb.set_message(format!(
                    "p(accept)≈{:.2} rhat≈{:.3}",
                    avg_p_accept, rhat
                ));
            } else {
                global_pb.set_message(format!("p(accept)≈{:.2}", avg_p_accept));
            }
        }

        if open.iter().all(|o| !o) {
            break;
        }
        thread::sleep(sleep);
    }

    chain_pbs.iter().for_each(|pb| pb.finish());
    global_pb.finish_with_message("Done!");
}
