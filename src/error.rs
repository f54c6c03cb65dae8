//! Error types for the sampling designs.
//!
//! Only caller-correctable conditions are reported here. Broken engine
//! invariants (erasing an inactive unit, removing a unit twice from the tree)
//! panic instead.

use thiserror::Error;

/// Errors surfaced by the public sampling functions.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SamplingError {
    /// The population has no units.
    #[error("population is empty")]
    EmptyPopulation,

    /// An inclusion probability is outside `[0, 1]` or not finite.
    #[error("probability at index {index} must be in [0, 1] (got {value})")]
    ProbabilityOutOfRange {
        /// Unit id.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// A matrix does not have one row per unit.
    #[error("{what} has {actual} rows, expected {expected}")]
    RowCountMismatch {
        /// Which input.
        what: &'static str,
        /// Number of units.
        expected: usize,
        /// Rows supplied.
        actual: usize,
    },

    /// A vector does not have one entry per unit.
    #[error("{what} has length {actual}, expected {expected}")]
    LengthMismatch {
        /// Which input.
        what: &'static str,
        /// Number of units.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },

    /// The balancing matrix has no columns.
    #[error("balancing matrix must have at least one column")]
    NoBalancingVariables,

    /// A scalar parameter is out of its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A rejective procedure found no admissible outcome.
    #[error("no admissible sample after {iterations} iterations")]
    NoConvergence {
        /// Attempts made before giving up.
        iterations: usize,
    },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SamplingError>;
