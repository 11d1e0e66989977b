//! Error type shared by the walker, the weight functions and the diagnostics.

use thiserror::Error;

/// A precondition violation on the inputs of a walk.
///
/// Every variant is raised before the first step is taken, so a failed call never
/// hands back a partial trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// The archipelago needs at least two islands for the ±1 proposal to make sense.
    #[error("domain size must be at least 2, got {0}")]
    DomainTooSmall(usize),

    /// The starting island lies outside `1..=domain_size`.
    #[error("start position {start} is outside the domain 1..={domain_size}")]
    StartOutOfRange { start: usize, domain_size: usize },

    /// An island's weight is zero, negative or NaN.
    #[error("weight of island {island} must be strictly positive, got {weight}")]
    NonPositiveWeight { island: usize, weight: f64 },

    /// An island's weight is infinite.
    #[error("weight of island {island} must be finite, got {weight}")]
    NonFiniteWeight { island: usize, weight: f64 },

    /// A recorded position handed to a diagnostic lies outside `1..=domain_size`.
    #[error("position {position} at index {index} is outside the domain 1..={domain_size}")]
    PositionOutOfRange {
        index: usize,
        position: usize,
        domain_size: usize,
    },

    /// Two distributions compared island by island cover different numbers of islands.
    #[error("distributions cover {left} and {right} islands")]
    LengthMismatch { left: usize, right: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = DomainError::StartOutOfRange {
            start: 11,
            domain_size: 10,
        };
        assert_eq!(
            err.to_string(),
            "start position 11 is outside the domain 1..=10"
        );

        let err = DomainError::NonPositiveWeight {
            island: 3,
            weight: -1.0,
        };
        assert!(err.to_string().contains("island 3"));
    }
}
