//! End-to-end checks of King Markov's walk: reproducibility, the shape of every trajectory,
//! the precondition errors, and convergence to the population-weighted distribution.

use king_markov::core::ChainRunner;
use king_markov::islands::{stationary, Populations, Proportional, Uniform};
use king_markov::metropolis::{run, AcceptRule, CyclicWalk, KingMarkov};
use king_markov::stats::{split_rhat_ess, total_variation, visit_frequencies, RunStats};
use king_markov::DomainError;
use proptest::prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    /// The worked example: 100,000 weeks on 10 islands with population k, starting at island 10.
    #[test]
    fn test_worked_example_converges() {
        const WEEKS: usize = 100_000;
        const SEED: u64 = 42;

        let weeks = run(WEEKS, 10, 10, &Proportional, SEED).unwrap();
        assert_eq!(weeks.len(), WEEKS);

        let freq = visit_frequencies(&weeks, 10).unwrap();
        for (i, f) in freq.iter().enumerate() {
            let expected = (i + 1) as f64 / 55.0;
            assert!(
                (f - expected).abs() < 0.01,
                "island {}: observed {f:.4}, expected {expected:.4}",
                i + 1
            );
        }
    }

    #[test]
    fn test_tabulated_populations_converge() {
        let census = Populations(vec![5.0, 1.0, 3.0, 1.0, 10.0]);
        let weeks = run(200_000, 5, 2, &census, 11).unwrap();
        let freq = visit_frequencies(&weeks, 5).unwrap();
        let target = stationary(&census, 5).unwrap();
        let tv = total_variation(&freq, &target).unwrap();
        assert!(tv < 0.02, "total variation {tv} too large");
    }

    #[test]
    fn test_parallel_walkers_agree() {
        let mut kings = KingMarkov::new(&Proportional, 10, &[1, 4, 7, 10])
            .unwrap()
            .set_seed(42);
        let sample = kings.run(20_000, 2_000).unwrap();
        let (rhat, ess) = split_rhat_ess(sample.view());
        assert!(rhat < 1.05, "rhat = {rhat}");
        assert!(ess > 100.0, "ess = {ess}");
    }

    /// With equal populations on two islands every move is accepted and the walk alternates.
    #[test]
    fn test_alternating_walkers_have_positive_ess() {
        let mut kings = KingMarkov::new(&Uniform(1.0), 2, &[1, 2])
            .unwrap()
            .set_seed(1);
        let sample = kings.run(1_000, 0).unwrap();
        assert!(sample.row(0).to_vec().windows(2).all(|w| w[0] != w[1]));

        let stats = RunStats::from(sample.view());
        assert_eq!(stats.p_accept, 1.0);
        assert!(stats.ess > 0.0, "ess = {}", stats.ess);
        assert!(stats.ess.is_finite(), "ess = {}", stats.ess);
    }

    #[test]
    fn test_raw_ratio_rule_through_runner() {
        let run_with = |rule: AcceptRule| {
            KingMarkov::new(&Proportional, 10, &[10, 3])
                .unwrap()
                .set_rule(rule)
                .set_seed(5)
                .run(10_000, 0)
                .unwrap()
        };
        assert_eq!(run_with(AcceptRule::Clamped), run_with(AcceptRule::RawRatio));
    }

    #[test]
    fn test_errors_surface_before_walking() {
        assert_eq!(
            run(10, 10, 0, &Proportional, 1),
            Err(DomainError::StartOutOfRange {
                start: 0,
                domain_size: 10
            })
        );
        assert!(matches!(
            run(10, 10, 11, &Proportional, 1),
            Err(DomainError::StartOutOfRange { start: 11, .. })
        ));
        assert!(matches!(
            run(10, 4, 1, &|k: usize| 2.0 - k as f64, 1),
            Err(DomainError::NonPositiveWeight { island: 2, .. })
        ));
        assert_eq!(
            run(10, 1, 1, &Proportional, 1),
            Err(DomainError::DomainTooSmall(1))
        );
    }

    #[test]
    fn test_two_islands() {
        let weeks = run(50_000, 2, 1, &Proportional, 3).unwrap();
        let freq = visit_frequencies(&weeks, 2).unwrap();
        assert!((freq[1] - 2.0 / 3.0).abs() < 0.02, "freq = {freq:?}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_reproducible(seed in any::<u64>(), n in 2usize..20, steps in 0usize..2_000) {
            let start = 1 + (seed as usize) % n;
            let a = run(steps, n, start, &Proportional, seed).unwrap();
            let b = run(steps, n, start, &Proportional, seed).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_contained_and_adjacent(seed in any::<u64>(), n in 2usize..20, steps in 1usize..2_000) {
            let start = 1 + (seed as usize) % n;
            let weeks = run(steps, n, start, &Proportional, seed).unwrap();
            prop_assert_eq!(weeks.len(), steps);
            prop_assert_eq!(weeks[0], start);
            prop_assert!(weeks.iter().all(|&k| (1..=n).contains(&k)));
            for w in weeks.windows(2) {
                let d = w[0].abs_diff(w[1]);
                prop_assert!(d == 0 || d == 1 || d == n - 1, "jump {} -> {}", w[0], w[1]);
            }
        }

        #[test]
        fn prop_uniform_never_stalls(seed in any::<u64>(), n in 3usize..20, c in 0.01f64..100.0) {
            let weeks = run(1_000, n, 1, &Uniform(c), seed).unwrap();
            prop_assert!(weeks.windows(2).all(|w| w[0] != w[1]));
        }

        #[test]
        fn prop_rules_equivalent(seed in any::<u64>(), n in 2usize..15) {
            let base = CyclicWalk::new(&Proportional, n, n).unwrap().set_seed(seed);
            let clamped = base.clone().walk(1_000);
            let raw = base.set_rule(AcceptRule::RawRatio).walk(1_000);
            prop_assert_eq!(clamped, raw);
        }
    }
}
