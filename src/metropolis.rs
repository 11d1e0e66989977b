/*!
# King Markov's Metropolis walk

A discrete-state Metropolis sampler over a cyclic archipelago of islands `1..=N`. Each week the
king flips a coin to pick a neighbouring island (clockwise or counter-clockwise, wrapping from
island `N` to island `1` and back), then moves there with probability
`min(1, weight(proposal) / weight(current))`. In the long run the share of weeks spent on each
island is proportional to its weight.

## Overview

- [`run`]: the one-shot walk. Validates its inputs, then returns the full trajectory.
- [`CyclicWalk`]: a single reusable walker implementing [`MarkovChain`].
- [`KingMarkov`]: many independent walkers, run in parallel through
  [`ChainRunner`](crate::core::ChainRunner).

Every step consumes exactly two random draws from the walker's own seeded generator: first the
direction, then the uniform acceptance draw.

## Example

```rust
use king_markov::islands::Proportional;
use king_markov::metropolis::run;

let weeks = run(1_000, 10, 10, &Proportional, 42).unwrap();
assert_eq!(weeks.len(), 1_000);
assert_eq!(weeks[0], 10);
assert!(weeks.iter().all(|&island| (1..=10).contains(&island)));
```
*/

use rand::prelude::*;
use rand_distr::Uniform;

use crate::core::{HasChains, MarkovChain};
use crate::error::DomainError;
use crate::islands::{tabulate, IslandWeight};

/// How the Metropolis ratio is turned into a move decision.
///
/// The two rules are equivalent: the uniform draw lies in `[0, 1)`, so a ratio above one is
/// accepted either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcceptRule {
    /// Compare the draw against `min(1, ratio)`.
    #[default]
    Clamped,
    /// Compare the draw against the raw ratio.
    RawRatio,
}

impl AcceptRule {
    fn p_move(self, ratio: f64) -> f64 {
        match self {
            AcceptRule::Clamped => ratio.min(1.0),
            AcceptRule::RawRatio => ratio,
        }
    }
}

/**
Simulates `num_steps` weeks of King Markov's tour and returns the island occupied at the start
of every week.

# Arguments

* `num_steps` - Number of weeks to simulate. Zero yields an empty trajectory.
* `domain_size` - Number of islands `N`; must be at least 2.
* `start` - Island the king starts on, in `1..=N`.
* `weight` - Population of each island; must be strictly positive and finite on `1..=N`.
* `seed` - Seed of the walker's random number generator.

# Errors

Returns a [`DomainError`] before taking any step if `start` is out of range, a weight is not
strictly positive and finite, or `domain_size < 2`.
*/
pub fn run<W>(
    num_steps: usize,
    domain_size: usize,
    start: usize,
    weight: &W,
    seed: u64,
) -> Result<Vec<usize>, DomainError>
where
    W: IslandWeight + ?Sized,
{
    let mut walker = CyclicWalk::new(weight, domain_size, start)?.set_seed(seed);
    Ok(walker.walk(num_steps))
}

/// A single Metropolis walker on the cycle `1..=N`.
///
/// The island weights are evaluated and validated once, at construction.
#[derive(Debug, Clone)]
pub struct CyclicWalk {
    /// `weights[k - 1]` is the weight of island `k`.
    weights: Vec<f64>,
    current: usize,
    /// The seed the walker's generator was created from.
    pub seed: u64,
    /// The acceptance rule in use.
    pub rule: AcceptRule,
    rng: SmallRng,
    unit: Uniform<f64>,
}

impl CyclicWalk {
    /**
    Creates a walker on `domain_size` islands starting at island `start`, seeded from entropy.

    ```rust
    use king_markov::islands::Proportional;
    use king_markov::metropolis::CyclicWalk;

    let walker = CyclicWalk::new(&Proportional, 10, 10).unwrap();
    assert_eq!(walker.position(), 10);
    assert!(CyclicWalk::new(&Proportional, 10, 11).is_err());
    ```
    */
    pub fn new<W>(weight: &W, domain_size: usize, start: usize) -> Result<Self, DomainError>
    where
        W: IslandWeight + ?Sized,
    {
        let weights = tabulate(weight, domain_size)?;
        if start == 0 || start > domain_size {
            return Err(DomainError::StartOutOfRange { start, domain_size });
        }
        let seed = thread_rng().gen::<u64>();
        log::trace!("New walker on {domain_size} islands starting at {start}");
        Ok(Self {
            weights,
            current: start,
            seed,
            rule: AcceptRule::default(),
            rng: SmallRng::seed_from_u64(seed),
            unit: Uniform::new(0.0, 1.0),
        })
    }

    /// Reseeds the walker's generator. Equal seeds reproduce equal trajectories.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Selects how the Metropolis ratio is compared against the uniform draw.
    pub fn set_rule(mut self, rule: AcceptRule) -> Self {
        self.rule = rule;
        self
    }

    /**
    The island the walker currently occupies. The position only changes through
    [`walk`](Self::walk) or [`MarkovChain::step`], so it always lies in `1..=N`.

    ```compile_fail
    use king_markov::islands::Proportional;
    use king_markov::metropolis::CyclicWalk;

    let mut walker = CyclicWalk::new(&Proportional, 10, 10).unwrap();
    walker.current = 0;
    ```
    */
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn domain_size(&self) -> usize {
        self.weights.len()
    }

    /// Walks `n_steps` weeks and returns the island occupied at the start of each one.
    pub fn walk(&mut self, n_steps: usize) -> Vec<usize> {
        let mut trajectory = Vec::with_capacity(n_steps);
        for _ in 0..n_steps {
            trajectory.push(self.current);
            self.transition();
        }
        trajectory
    }

    /// Neighbour of the current island in the given direction, wrapping around the cycle.
    fn neighbour(&self, clockwise: bool) -> usize {
        let n = self.domain_size();
        if clockwise {
            if self.current == n {
                1
            } else {
                self.current + 1
            }
        } else if self.current == 1 {
            n
        } else {
            self.current - 1
        }
    }

    fn transition(&mut self) {
        let clockwise: bool = self.rng.gen();
        let proposal = self.neighbour(clockwise);
        let ratio = self.weights[proposal - 1] / self.weights[self.current - 1];
        let u = self.unit.sample(&mut self.rng);
        if u < self.rule.p_move(ratio) {
            self.current = proposal;
        }
    }
}

impl MarkovChain<usize> for CyclicWalk {
    fn step(&mut self) -> &usize {
        self.transition();
        &self.current
    }

    fn current_state(&self) -> &usize {
        &self.current
    }
}

/**
Many independent King Markov walkers over the same archipelago.

Walker `i` is seeded with `seed + i`, so a fixed global seed makes the whole run reproducible
while keeping the walkers distinct.

```rust
use king_markov::core::ChainRunner;
use king_markov::islands::Proportional;
use king_markov::metropolis::KingMarkov;

let mut kings = KingMarkov::new(&Proportional, 10, &[1, 5, 10]).unwrap().set_seed(42);
let sample = kings.run(1_000, 100).unwrap();
assert_eq!(sample.shape(), &[3, 1_000]);
```
*/
#[derive(Debug, Clone)]
pub struct KingMarkov {
    /// The independent walkers.
    pub chains: Vec<CyclicWalk>,
    /// The global seed.
    pub seed: u64,
}

impl KingMarkov {
    /// Creates one walker per entry of `starts`.
    pub fn new<W>(weight: &W, domain_size: usize, starts: &[usize]) -> Result<Self, DomainError>
    where
        W: IslandWeight + ?Sized,
    {
        let chains = starts
            .iter()
            .map(|&start| CyclicWalk::new(weight, domain_size, start))
            .collect::<Result<Vec<_>, _>>()?;
        let seed = thread_rng().gen::<u64>();
        Ok(Self { chains, seed })
    }

    /// Sets a new global seed; walker `i` receives `seed + i`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.chains = self
            .chains
            .into_iter()
            .enumerate()
            .map(|(i, chain)| chain.set_seed(seed.wrapping_add(i as u64)))
            .collect();
        self
    }

    /// Applies `rule` to every walker.
    pub fn set_rule(mut self, rule: AcceptRule) -> Self {
        self.chains = self
            .chains
            .into_iter()
            .map(|chain| chain.set_rule(rule))
            .collect();
        self
    }
}

impl HasChains<usize> for KingMarkov {
    type Chain = CyclicWalk;

    fn chains_mut(&mut self) -> &mut Vec<Self::Chain> {
        &mut self.chains
    }
}

/// Draws `n_chains` starting islands uniformly from `1..=domain_size`, deterministically
/// for a given seed.
pub fn init_starts(n_chains: usize, domain_size: usize, seed: u64) -> Vec<usize> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n_chains)
        .map(|_| rng.gen_range(1..=domain_size.max(1)))
        .collect()
}
