//! Unit-decision lifecycle shared by every engine.
//!
//! A unit moves from *active* to *out* or *in* exactly once, and only through
//! [`BaseSampling::resolve_unit`]. That single choke point keeps the index
//! list, the k-d tree and the sample in step with each other.

use ndarray::ArrayView2;
use rand::Rng;

use crate::index_list::IndexList;
use crate::kdtree::KdTree;
use crate::options::SamplingOptions;

/// A sampling engine that runs to completion and yields the selected ids.
pub trait Sampler {
    /// Decide every unit and return the sample in decision order.
    fn run(self) -> Vec<usize>;
}

/// State common to all engines: working probabilities, the active set, the
/// optional spatial index and the growing sample.
#[derive(Debug)]
pub struct BaseSampling<'r, R: ?Sized> {
    pub(crate) eps: f64,
    pub(crate) rng: &'r mut R,
    pub(crate) probabilities: Vec<f64>,
    pub(crate) idx: IndexList,
    pub(crate) tree: Option<KdTree>,
    sample: Vec<usize>,
}

impl<'r, R: Rng + ?Sized> BaseSampling<'r, R> {
    /// Copy `probabilities`, activate every unit and resolve the units that
    /// already sit on 0 or 1. No randomness is consumed.
    pub fn new(probabilities: &[f64], options: &SamplingOptions, rng: &'r mut R) -> Self {
        let n = probabilities.len();
        let mut base = Self {
            eps: options.eps,
            rng,
            probabilities: probabilities.to_vec(),
            idx: IndexList::filled(n),
            tree: None,
            sample: Vec::new(),
        };

        for id in 0..n {
            base.resolve_unit(id);
        }
        base
    }

    /// Attach a k-d tree over the units still active.
    pub fn with_tree(mut self, coordinates: ArrayView2<'_, f64>, bucket_size: usize) -> Self {
        let units: Vec<usize> = self.idx.iter().collect();
        self.tree = Some(KdTree::with_units(coordinates, &units, bucket_size));
        self
    }

    /// Decide `id` if its probability is within `eps` of 0 or 1.
    ///
    /// Returns whether the unit was decided. A decided unit leaves the index
    /// list and the tree, its probability is snapped to exactly 0 or 1, and it
    /// joins the sample if it reached 1.
    pub fn resolve_unit(&mut self, id: usize) -> bool {
        let p = self.probabilities[id];
        let included = p >= 1.0 - self.eps;
        if !included && p > self.eps {
            return false;
        }

        self.idx.erase(id);
        if let Some(tree) = self.tree.as_mut() {
            tree.remove_unit(id);
        }
        if included {
            self.probabilities[id] = 1.0;
            self.sample.push(id);
        } else {
            self.probabilities[id] = 0.0;
        }
        true
    }

    /// Force the outcome of `id` and resolve it.
    pub fn decide_unit(&mut self, id: usize, include: bool) {
        self.probabilities[id] = if include { 1.0 } else { 0.0 };
        self.resolve_unit(id);
    }

    /// A uniform draw in `[0, 1)`.
    #[inline]
    pub fn random(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// A uniformly random active unit.
    pub fn draw_unit(&mut self) -> usize {
        self.idx.draw(&mut *self.rng)
    }

    /// Boundary tolerance.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Working probabilities (decided units hold exactly 0 or 1).
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// The active set.
    pub fn index_list(&self) -> &IndexList {
        &self.idx
    }

    /// Units selected so far, in decision order.
    pub fn sample(&self) -> &[usize] {
        &self.sample
    }

    /// Whether every unit has been decided.
    pub fn is_done(&self) -> bool {
        self.idx.is_empty()
    }

    /// Finish the run and hand back the sample.
    pub fn into_sample(self) -> Vec<usize> {
        debug_assert!(self.idx.is_empty(), "sample taken before every unit was decided");
        self.sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn boundary_units_are_decided_up_front() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let probs = [1.0, 0.0, 0.5, 1.0 - 1e-12, 1e-12];
        let base = BaseSampling::new(&probs, &SamplingOptions::default(), &mut rng);
        assert_eq!(base.sample(), &[0, 3]);
        assert_eq!(base.index_list().as_slice(), &[2]);
        assert_eq!(base.probabilities(), &[1.0, 0.0, 0.5, 1.0, 0.0]);
    }

    #[test]
    fn resolve_unit_keeps_tree_in_step() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let coords = array![[0.0], [1.0], [2.0], [3.0]];
        let probs = [0.5, 0.0, 0.5, 0.5];
        let mut base = BaseSampling::new(&probs, &SamplingOptions::default(), &mut rng)
            .with_tree(coords.view(), 1);
        let tree = base.tree.as_ref().expect("tree attached");
        assert_eq!(tree.len(), 3);
        assert!(!tree.contains(1));

        assert!(!base.resolve_unit(0));
        base.probabilities[0] = 0.9999999999;
        assert!(base.resolve_unit(0));
        assert!(!base.tree.as_ref().expect("tree attached").contains(0));
        assert_eq!(base.sample(), &[0]);

        base.decide_unit(2, false);
        base.decide_unit(3, true);
        assert!(base.is_done());
        assert_eq!(base.into_sample(), vec![0, 3]);
    }
}
