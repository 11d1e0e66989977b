//! Diagnostics for island walks: visit tallies, acceptance rate, autocorrelation, and the
//! multi-chain convergence statistics (split R-hat and effective sample size).

use core::fmt;
use ndarray::{concatenate, prelude::*};
use num_traits::ToPrimitive;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::error::Error;

use crate::error::DomainError;

/// Smoothing factor of the running acceptance-rate estimate.
const ALPHA: f64 = 0.01;

/// Sequences up to this length use the brute force autocovariance.
const BRUTE_FORCE_MAX_LEN: usize = 100;

/// Counts how often each island was visited. Index `k - 1` holds the count for island `k`.
pub fn visit_counts(trajectory: &[usize], domain_size: usize) -> Result<Vec<u64>, DomainError> {
    let mut counts = vec![0u64; domain_size];
    for (index, &position) in trajectory.iter().enumerate() {
        if position == 0 || position > domain_size {
            return Err(DomainError::PositionOutOfRange {
                index,
                position,
                domain_size,
            });
        }
        counts[position - 1] += 1;
    }
    Ok(counts)
}

/// Relative visit frequencies, indexed like [`visit_counts`]. An empty trajectory yields
/// all zeros.
pub fn visit_frequencies(
    trajectory: &[usize],
    domain_size: usize,
) -> Result<Vec<f64>, DomainError> {
    let counts = visit_counts(trajectory, domain_size)?;
    let total = trajectory.len().max(1) as f64;
    Ok(counts.into_iter().map(|c| c as f64 / total).collect())
}

/// Fraction of consecutive recorded states that differ, i.e. the share of accepted moves.
pub fn acceptance_rate<T: PartialEq>(trajectory: &[T]) -> f64 {
    if trajectory.len() < 2 {
        return 0.0;
    }
    let moves = trajectory.windows(2).filter(|w| w[0] != w[1]).count();
    moves as f64 / (trajectory.len() - 1) as f64
}

/// Total variation distance `½ Σ |p - q|` between two distributions over the same islands.
pub fn total_variation(empirical: &[f64], target: &[f64]) -> Result<f64, DomainError> {
    if empirical.len() != target.len() {
        return Err(DomainError::LengthMismatch {
            left: empirical.len(),
            right: target.len(),
        });
    }
    Ok(0.5
        * empirical
            .iter()
            .zip(target)
            .map(|(p, q)| (p - q).abs())
            .sum::<f64>())
}

/**
Normalized autocorrelation of `series` at lags `0..=max_lag`.

Lags at or beyond the series length are dropped. A constant series has no variance;
its autocorrelation is reported as `1` at lag 0 and `0` elsewhere.

```rust
use king_markov::stats::autocorrelation;

let alternating: Vec<usize> = (0..50).map(|i| 1 + i % 2).collect();
let rho = autocorrelation(&alternating, 2);
assert!((rho[0] - 1.0).abs() < 1e-12);
assert!(rho[1] < -0.9);
assert!(rho[2] > 0.9);
```
*/
pub fn autocorrelation<T: ToPrimitive>(series: &[T], max_lag: usize) -> Vec<f64> {
    let x: Vec<f64> = series.iter().filter_map(|v| v.to_f64()).collect();
    if x.is_empty() {
        return vec![];
    }
    let acov = autocov(&x);
    let n_lags = (max_lag + 1).min(acov.len());
    if acov[0] <= 0.0 {
        let mut out = vec![0.0; n_lags];
        out[0] = 1.0;
        return out;
    }
    acov[..n_lags].iter().map(|c| c / acov[0]).collect()
}

fn autocov(x: &[f64]) -> Vec<f64> {
    if x.len() <= BRUTE_FORCE_MAX_LEN {
        autocov_bf(x)
    } else {
        autocov_fft(x)
    }
}

/// Autocovariance of a single sequence via zero-padded FFT.
///
/// Padding to at least `2n - 1` avoids circular wrap-around. `rustfft` leaves the inverse
/// transform unnormalized, so the `1/n_padded` factor is applied here.
fn autocov_fft(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;
    let mut n_padded = 1;
    while n_padded < 2 * n - 1 {
        n_padded <<= 1;
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_padded);
    let ffti = planner.plan_fft_inverse(n_padded);

    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|xi| Complex::new(xi - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n_padded - n))
        .collect();
    fft.process(&mut buf);
    buf.iter_mut().for_each(|c| *c *= c.conj());
    ffti.process(&mut buf);
    buf.iter()
        .take(n)
        .map(|c| c.re / n_padded as f64 / n as f64)
        .collect()
}

/// Brute force autocovariance: `out[lag] = 1/n Σ_t (x_t - x̄)(x_{t+lag} - x̄)`.
fn autocov_bf(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = x.iter().map(|v| v - mean).collect();
    (0..n)
        .map(|lag| {
            (0..n - lag)
                .map(|t| centered[t] * centered[t + lag])
                .sum::<f64>()
                / n as f64
        })
        .collect()
}

/// Tracks running statistics of a single scalar chain while it is being generated.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTracker {
    n: u64,
    p_accept: f64,
    last_state: f64,
    mean: f64,
    mean_sq: f64,
}

/// Snapshot of a [`ChainTracker`].
///
/// # Fields
/// - `n`: Number of states seen.
/// - `p_accept`: Exponentially smoothed acceptance rate.
/// - `mean`: Mean of the states.
/// - `sm2`: Unbiased sample variance of the states.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub n: u64,
    pub p_accept: f64,
    pub mean: f64,
    pub sm2: f64,
}

impl ChainTracker {
    /// Creates a tracker for a chain currently sitting at `initial_state`.
    pub fn new<T: ToPrimitive>(initial_state: &T) -> Self {
        Self {
            n: 0,
            p_accept: -1.0,
            last_state: initial_state.to_f64().unwrap_or(f64::NAN),
            mean: 0.0,
            mean_sq: 0.0,
        }
    }

    /// Folds the next recorded state into the running statistics.
    pub fn step<T: ToPrimitive>(&mut self, x: &T) -> Result<(), Box<dyn Error>> {
        let x = x
            .to_f64()
            .ok_or("Chain state could not be converted to f64.")?;
        self.n += 1;
        let n = self.n as f64;
        self.mean += (x - self.mean) / n;
        self.mean_sq += (x * x - self.mean_sq) / n;

        let accepted = (x != self.last_state) as i32 as f64;
        // Seed the moving average with the first observation instead of decaying from zero.
        self.p_accept = if self.p_accept < 0.0 {
            accepted
        } else {
            (1.0 - ALPHA) * self.p_accept + ALPHA * accepted
        };
        self.last_state = x;
        Ok(())
    }

    pub fn stats(&self) -> ChainStats {
        let n = self.n as f64;
        let sm2 = if self.n > 1 {
            (self.mean_sq - self.mean * self.mean) * n / (n - 1.0)
        } else {
            0.0
        };
        ChainStats {
            n: self.n,
            p_accept: self.p_accept.max(0.0),
            mean: self.mean,
            sm2,
        }
    }
}

/// Potential scale reduction factor computed from running per-chain statistics.
///
/// Returns `NaN` for fewer than two chains or when no chain has any variance yet.
pub fn collect_rhat(chain_stats: &[&ChainStats]) -> f64 {
    let m = chain_stats.len();
    if m < 2 {
        return f64::NAN;
    }
    let n = chain_stats.iter().map(|s| s.n as f64).sum::<f64>() / m as f64;
    let grand_mean = chain_stats.iter().map(|s| s.mean).sum::<f64>() / m as f64;
    let between = chain_stats
        .iter()
        .map(|s| (s.mean - grand_mean).powi(2))
        .sum::<f64>()
        * n
        / (m - 1) as f64;
    let within = chain_stats.iter().map(|s| s.sm2).sum::<f64>() / m as f64;
    if !(within > 0.0) {
        return f64::NAN;
    }
    let var = within * (n - 1.0) / n + between / n;
    (var / within).sqrt()
}

/// Takes a (chains, steps) view and returns a (2 * chains, steps / 2) array by splitting
/// every chain in half. With an odd number of steps the middle observation is dropped.
fn splitcat(sample: ArrayView2<f64>) -> Array2<f64> {
    let half = (sample.ncols() / 2) as isize;
    let first = sample.slice(s![.., ..half]);
    let second = sample.slice(s![.., -half..]);
    concatenate(Axis(0), &[first, second]).expect("Expected stacking two halves to succeed")
}

/// Within-chain variance `W` and the pooled estimate `var+` of a (chains, steps) sample.
fn withinvar(sample: ArrayView2<f64>) -> (f64, f64) {
    let (m, n) = sample.dim();
    let chain_means: Vec<f64> = sample
        .outer_iter()
        .map(|row| row.sum() / n as f64)
        .collect();
    let grand_mean = chain_means.iter().sum::<f64>() / m as f64;
    let between = chain_means
        .iter()
        .map(|cm| (cm - grand_mean).powi(2))
        .sum::<f64>()
        * n as f64
        / (m - 1) as f64;
    let within = sample
        .outer_iter()
        .zip(&chain_means)
        .map(|(row, cm)| row.iter().map(|v| (v - cm).powi(2)).sum::<f64>() / (n - 1) as f64)
        .sum::<f64>()
        / m as f64;
    let var = within * (n - 1) as f64 / n as f64 + between / n as f64;
    (within, var)
}

/// Effective sample size from the chain autocovariances, truncated with Geyer's initial
/// monotone sequence.
///
/// The first pair is always kept, and `tau` is floored at `1 / log10(m * n)` so that
/// anti-correlated chains get a positive ESS bounded by `m * n * log10(m * n)`.
fn ess(sample: ArrayView2<f64>, within: f64, var: f64) -> f64 {
    let (m, n) = sample.dim();
    let chain_acov: Vec<Vec<f64>> = (0..m)
        .into_par_iter()
        .map(|c| autocov(&sample.row(c).to_vec()))
        .collect();
    let rho: Vec<f64> = (0..n)
        .map(|t| {
            let avg = chain_acov.iter().map(|acov| acov[t]).sum::<f64>() / m as f64;
            1.0 - (within - avg) / var
        })
        .collect();

    let mut min = if rho.len() >= 2 { rho[0] + rho[1] } else { 0.0 };
    let mut sum = 0.0;
    for (t, pair) in rho.chunks_exact(2).enumerate() {
        let mut p_t = pair[0] + pair[1];
        if t > 0 && p_t <= 0.0 {
            break;
        }
        if p_t > min {
            p_t = min;
        }
        min = p_t;
        sum += p_t;
    }
    let total = m as f64 * n as f64;
    let tau = (-1.0 + 2.0 * sum).max(1.0 / total.log10());
    total / tau
}

/**
Split R-hat and effective sample size of a (chains, steps) sample.

Each chain is split in half before the statistics are computed. Samples with fewer than
four steps per chain, or without any within-chain variance, yield `NaN`s.

```rust
use king_markov::stats::split_rhat_ess;
use ndarray::arr2;

let sample = arr2(&[[1usize, 2, 1, 2, 3, 2], [2, 3, 2, 1, 2, 3]]);
let (rhat, ess) = split_rhat_ess(sample.view());
assert!(rhat.is_finite());
assert!(ess > 0.0);
```
*/
pub fn split_rhat_ess<T>(sample: ArrayView2<T>) -> (f64, f64)
where
    T: ToPrimitive + Clone,
{
    let f64_sample = sample.mapv(|x| x.to_f64().unwrap_or(f64::NAN));
    if f64_sample.nrows() == 0 || f64_sample.ncols() < 4 {
        return (f64::NAN, f64::NAN);
    }
    let splitted = splitcat(f64_sample.view());
    let (within, var) = withinvar(splitted.view());
    if !(within > 0.0) {
        return (f64::NAN, f64::NAN);
    }
    let rhat = (var / within).sqrt();
    (rhat, ess(splitted.view(), within, var))
}

/// Summary of a finished multi-chain run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunStats {
    pub p_accept: f64,
    pub ess: f64,
    pub rhat: f64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p(accept): {:.3}, ESS: {:.1}, split R-hat: {:.4}",
            self.p_accept, self.ess, self.rhat
        )
    }
}

impl<T> From<ArrayView2<'_, T>> for RunStats
where
    T: ToPrimitive + Clone + PartialEq,
{
    fn from(sample: ArrayView2<T>) -> Self {
        let n_chains = sample.nrows().max(1) as f64;
        let p_accept = sample
            .outer_iter()
            .map(|row| acceptance_rate(&row.to_vec()))
            .sum::<f64>()
            / n_chains;
        let (rhat, ess) = split_rhat_ess(sample);
        RunStats {
            p_accept,
            ess,
            rhat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn counts_and_frequencies() {
        let traj = [1, 2, 2, 3, 3, 3];
        assert_eq!(visit_counts(&traj, 3).unwrap(), vec![1, 2, 3]);
        let freq = visit_frequencies(&traj, 4).unwrap();
        assert_abs_diff_eq!(freq[2], 0.5, epsilon = 1e-12);
        assert_eq!(freq[3], 0.0);
    }

    #[test]
    fn out_of_range_position_is_reported() {
        let err = visit_counts(&[1, 2, 0], 3).unwrap_err();
        assert_eq!(
            err,
            DomainError::PositionOutOfRange {
                index: 2,
                position: 0,
                domain_size: 3
            }
        );
        assert!(visit_counts(&[4], 3).is_err());
    }

    #[test]
    fn empty_trajectory_has_zero_frequencies() {
        assert_eq!(visit_frequencies(&[], 3).unwrap(), vec![0.0; 3]);
        assert_eq!(acceptance_rate::<usize>(&[]), 0.0);
    }

    #[test]
    fn acceptance_rate_counts_moves() {
        assert_abs_diff_eq!(acceptance_rate(&[1, 1, 2, 2, 3]), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn total_variation_of_identical_and_disjoint() {
        assert_eq!(total_variation(&[0.5, 0.5], &[0.5, 0.5]).unwrap(), 0.0);
        assert_abs_diff_eq!(total_variation(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 1.0);
    }

    #[test]
    fn total_variation_rejects_mismatched_lengths() {
        assert_eq!(
            total_variation(&[0.5, 0.5], &[0.2, 0.3, 0.5]),
            Err(DomainError::LengthMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn brute_force_and_fft_autocov_agree() {
        let mut rng = SmallRng::seed_from_u64(42);
        let x: Vec<f64> = (0..257).map(|_| rng.gen::<f64>()).collect();
        let bf = autocov_bf(&x);
        let fft = autocov_fft(&x);
        for (a, b) in bf.iter().zip(fft.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn autocorrelation_of_constant_series() {
        let rho = autocorrelation(&[4usize; 10], 3);
        assert_eq!(rho, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn autocorrelation_truncates_to_series_length() {
        let rho = autocorrelation(&[1usize, 2, 3], 10);
        assert_eq!(rho.len(), 3);
        assert!(autocorrelation::<usize>(&[], 5).is_empty());
    }

    #[test]
    fn tracker_running_moments() {
        let mut tracker = ChainTracker::new(&1usize);
        for x in [1usize, 2, 3, 4] {
            tracker.step(&x).unwrap();
        }
        let stats = tracker.stats();
        assert_eq!(stats.n, 4);
        assert_abs_diff_eq!(stats.mean, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.sm2, 5.0 / 3.0, epsilon = 1e-12);
        assert!(stats.p_accept > 0.0 && stats.p_accept <= 1.0);
    }

    #[test]
    fn rhat_of_identical_chains_is_below_one() {
        let a = ChainStats {
            n: 100,
            p_accept: 0.5,
            mean: 2.0,
            sm2: 1.0,
        };
        let rhat = collect_rhat(&[&a, &a.clone()]);
        assert_abs_diff_eq!(rhat, (99.0f64 / 100.0).sqrt(), epsilon = 1e-12);
        assert!(collect_rhat(&[&a]).is_nan());
    }

    #[test]
    fn split_rhat_flags_disagreeing_chains() {
        let mut rng = SmallRng::seed_from_u64(7);
        let agree = Array2::from_shape_fn((4, 1000), |_| rng.gen_range(1..=10usize));
        let (rhat, ess) = split_rhat_ess(agree.view());
        assert!(rhat < 1.01, "rhat = {rhat}");
        assert!(ess > 2000.0, "ess = {ess}");

        let disagree = Array2::from_shape_fn((2, 1000), |(c, _)| {
            if c == 0 {
                rng.gen_range(1..=3usize)
            } else {
                rng.gen_range(8..=10usize)
            }
        });
        let (rhat, _) = split_rhat_ess(disagree.view());
        assert!(rhat > 2.0, "rhat = {rhat}");
    }

    #[test]
    fn ess_of_alternating_chains_is_positive_and_bounded() {
        let alternating = Array2::from_shape_fn((2, 1000), |(c, t)| 1 + (c + t) % 2);
        let (rhat, ess) = split_rhat_ess(alternating.view());
        assert!(rhat.is_finite(), "rhat = {rhat}");
        let total = 2.0 * 1000.0;
        assert!(ess > 0.0, "ess = {ess}");
        assert!(ess <= total * f64::log10(total) + 1e-6, "ess = {ess}");
    }

    #[test]
    fn split_rhat_of_short_or_constant_sample_is_nan() {
        let (rhat, ess) = split_rhat_ess(arr2(&[[1usize, 2, 3]]).view());
        assert!(rhat.is_nan() && ess.is_nan());
        let (rhat, _) = split_rhat_ess(Array2::<usize>::ones((2, 10)).view());
        assert!(rhat.is_nan());
    }

    #[test]
    fn run_stats_display() {
        let stats = RunStats::from(arr2(&[[1usize, 2, 2, 3, 3, 3, 2, 1]]).view());
        assert_abs_diff_eq!(stats.p_accept, 4.0 / 7.0, epsilon = 1e-12);
        assert!(stats.to_string().starts_with("p(accept): 0.571"));
    }
}
