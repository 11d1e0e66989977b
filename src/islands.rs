/*!
Weight functions ("populations") over a cyclic archipelago of islands `1..=N`, together with
validation and the exact stationary distribution a Metropolis walk over them converges to.

# Examples

```rust
use king_markov::islands::{stationary, IslandWeight, Proportional};

// Island k has population k, so island 10 is ten times as popular as island 1.
assert_eq!(Proportional.weight(10), 10.0);

let target = stationary(&Proportional, 10).unwrap();
assert!((target[9] - 10.0 / 55.0).abs() < 1e-12);
```
*/

use crate::error::DomainError;

/// An unnormalized target density over islands `1..=N`.
///
/// Implementations must be total on the domain they are used with and return the same
/// value for the same island every time; walkers evaluate them once up front.
pub trait IslandWeight {
    /// Returns the (unnormalized) weight of `island`, a 1-based index.
    fn weight(&self, island: usize) -> f64;
}

/// The worked example's weighting: island `k` has population `k`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Proportional;

impl IslandWeight for Proportional {
    fn weight(&self, island: usize) -> f64 {
        island as f64
    }
}

/// Every island has the same population, which turns the walk into an unbiased ±1 walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform(pub f64);

impl Default for Uniform {
    fn default() -> Self {
        Uniform(1.0)
    }
}

impl IslandWeight for Uniform {
    fn weight(&self, _island: usize) -> f64 {
        self.0
    }
}

/**
Tabulated populations, where `populations[k - 1]` is the weight of island `k`.

Islands beyond the end of the table have weight zero and are therefore rejected by
[`tabulate`].

```rust
use king_markov::islands::{IslandWeight, Populations};

let census = Populations(vec![120.0, 45.0, 300.0]);
assert_eq!(census.weight(3), 300.0);
assert_eq!(census.weight(4), 0.0);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Populations(pub Vec<f64>);

impl IslandWeight for Populations {
    fn weight(&self, island: usize) -> f64 {
        island
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}

impl<F> IslandWeight for F
where
    F: Fn(usize) -> f64,
{
    fn weight(&self, island: usize) -> f64 {
        self(island)
    }
}

/// Evaluates `weight` on every island `1..=domain_size` and checks that each value is
/// strictly positive and finite.
///
/// The returned vector is indexed by `island - 1`.
pub fn tabulate<W>(weight: &W, domain_size: usize) -> Result<Vec<f64>, DomainError>
where
    W: IslandWeight + ?Sized,
{
    if domain_size < 2 {
        return Err(DomainError::DomainTooSmall(domain_size));
    }
    (1..=domain_size)
        .map(|island| {
            let w = weight.weight(island);
            // `!(w > 0.0)` also catches NaN.
            if !(w > 0.0) {
                Err(DomainError::NonPositiveWeight { island, weight: w })
            } else if w.is_infinite() {
                Err(DomainError::NonFiniteWeight { island, weight: w })
            } else {
                Ok(w)
            }
        })
        .collect()
}

/// Returns the normalized target distribution `weight(k) / Σ weight`, indexed by `k - 1`.
pub fn stationary<W>(weight: &W, domain_size: usize) -> Result<Vec<f64>, DomainError>
where
    W: IslandWeight + ?Sized,
{
    let table = tabulate(weight, domain_size)?;
    let total: f64 = table.iter().sum();
    Ok(table.into_iter().map(|w| w / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn proportional_stationary_matches_k_over_55() {
        let target = stationary(&Proportional, 10).unwrap();
        for (i, p) in target.iter().enumerate() {
            assert_abs_diff_eq!(*p, (i + 1) as f64 / 55.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(target.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn closures_are_weights() {
        let squared = |k: usize| (k * k) as f64;
        let table = tabulate(&squared, 3).unwrap();
        assert_eq!(table, vec![1.0, 4.0, 9.0]);
    }

    #[test]
    fn zero_weight_is_rejected() {
        let err = tabulate(&|k: usize| if k == 4 { 0.0 } else { 1.0 }, 5).unwrap_err();
        assert_eq!(
            err,
            DomainError::NonPositiveWeight {
                island: 4,
                weight: 0.0
            }
        );
    }

    #[test]
    fn negative_nan_and_infinite_weights_are_rejected() {
        assert!(matches!(
            tabulate(&Uniform(-2.0), 3),
            Err(DomainError::NonPositiveWeight { island: 1, .. })
        ));
        assert!(matches!(
            tabulate(&Uniform(f64::NAN), 3),
            Err(DomainError::NonPositiveWeight { .. })
        ));
        assert!(matches!(
            tabulate(&Uniform(f64::INFINITY), 3),
            Err(DomainError::NonFiniteWeight { .. })
        ));
    }

    #[test]
    fn short_population_table_is_rejected() {
        let census = Populations(vec![1.0, 2.0]);
        assert!(matches!(
            tabulate(&census, 3),
            Err(DomainError::NonPositiveWeight { island: 3, .. })
        ));
        assert_eq!(census.weight(0), 0.0);
    }

    #[test]
    fn tiny_domains_are_rejected() {
        assert_eq!(
            tabulate(&Proportional, 1),
            Err(DomainError::DomainTooSmall(1))
        );
        assert_eq!(
            tabulate(&Proportional, 0),
            Err(DomainError::DomainTooSmall(0))
        );
    }
}
