//! Tuning knobs shared by every design.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, SamplingError};

/// Default tolerance for treating a probability as 0 or 1.
pub const DEFAULT_EPS: f64 = 1e-9;

/// Default maximum number of units in a k-d tree leaf.
pub const DEFAULT_TREE_BUCKET_SIZE: usize = 40;

/// Options common to all sampling designs.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingOptions {
    /// A probability within `eps` of 0 or 1 is considered decided.
    pub eps: f64,

    /// Maximum leaf size of the k-d tree used by the spatial designs.
    pub tree_bucket_size: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            tree_bucket_size: DEFAULT_TREE_BUCKET_SIZE,
        }
    }
}

impl SamplingOptions {
    /// Set the boundary tolerance.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set the k-d tree leaf size.
    pub fn with_tree_bucket_size(mut self, size: usize) -> Self {
        self.tree_bucket_size = size;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.eps.is_finite() || self.eps <= 0.0 || self.eps >= 0.5 {
            return Err(SamplingError::InvalidParameter(format!(
                "eps must be in (0, 0.5) (got {})",
                self.eps
            )));
        }
        if self.tree_bucket_size == 0 {
            return Err(SamplingError::InvalidParameter(
                "tree_bucket_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The default seeded generator.
///
/// Every design takes its generator explicitly; this is just the one the
/// tests, benches and demos construct at the call site.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}
