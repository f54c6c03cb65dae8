//! Distance functions usable by [`KdTree`](super::KdTree).

/// A distance over coordinate rows that supports split-plane pruning.
///
/// `axis_bound(diff)` must never exceed the distance between two points whose
/// coordinates differ by `diff` along a single axis, whatever their other
/// coordinates are. The tree relies on this to skip subtrees.
pub trait Metric {
    /// Distance between two rows of equal length.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Lower bound on the distance implied by a difference along one axis.
    fn axis_bound(&self, diff: f64) -> f64;
}

/// Squared Euclidean distance (the default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SquaredEuclidean;

impl Metric for SquaredEuclidean {
    #[inline]
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }

    #[inline]
    fn axis_bound(&self, diff: f64) -> f64 {
        diff * diff
    }
}

/// L1 distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Manhattan;

impl Metric for Manhattan {
    #[inline]
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
    }

    #[inline]
    fn axis_bound(&self, diff: f64) -> f64 {
        diff.abs()
    }
}
