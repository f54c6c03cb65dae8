//! Local pivotal method (LPM1, LPM2).
//!
//! Each step pairs two nearby active units and lets them compete for their
//! combined probability mass: one of them is decided, the other absorbs the
//! remainder. Pairing nearby units makes neighbours unlikely to be selected
//! together, so the sample is spread in auxiliary space.
//!
//! ## References
//!
//! - Deville & Tillé (1998): *Unequal probability sampling without
//!   replacement through a splitting method* (the pivotal method).
//! - Grafström, Lundström & Schelin (2012): *Spatially balanced sampling
//!   through the pivotal method*.

use ndarray::ArrayView2;
use rand::Rng;

use crate::base::{BaseSampling, Sampler};
use crate::error::Result;
use crate::kdtree::{KdStore, KdTree};
use crate::options::SamplingOptions;
use crate::validate;

/// Strategy choosing the pair of units that compete in one step.
pub trait PairSelection {
    /// A pair of distinct active units, or `None` if only one unit is left.
    fn pair<R: Rng + ?Sized>(&mut self, base: &mut BaseSampling<'_, R>) -> Option<(usize, usize)>;
}

/// A random nearest neighbour of `unit`, if any is active.
fn random_neighbour<R: Rng + ?Sized>(
    tree: &KdTree,
    store: &mut KdStore,
    unit: usize,
    rng: &mut R,
) -> Option<usize> {
    tree.find_neighbours(store, unit);
    let tied = store.tied_at_min();
    if tied == 0 {
        return None;
    }
    Some(store.neighbours()[rng.random_range(0..tied)])
}

/// LPM2: a random unit and one of its nearest neighbours.
#[derive(Debug, Clone, Default)]
pub struct Lpm2 {
    store: KdStore,
}

impl PairSelection for Lpm2 {
    fn pair<R: Rng + ?Sized>(&mut self, base: &mut BaseSampling<'_, R>) -> Option<(usize, usize)> {
        let i = base.draw_unit();
        let tree = base.tree.as_ref()?;
        let j = random_neighbour(tree, &mut self.store, i, &mut *base.rng)?;
        Some((i, j))
    }
}

/// LPM1: like LPM2, but the pair is accepted only when the two units are
/// mutual nearest neighbours.
///
/// After as many rejected draws as there are active units the last pair is
/// taken anyway.
#[derive(Debug, Clone, Default)]
pub struct Lpm1 {
    store: KdStore,
}

impl PairSelection for Lpm1 {
    fn pair<R: Rng + ?Sized>(&mut self, base: &mut BaseSampling<'_, R>) -> Option<(usize, usize)> {
        let attempts = base.idx.len();
        let mut last = None;
        for _ in 0..attempts {
            let i = base.draw_unit();
            let tree = base.tree.as_ref()?;
            let j = random_neighbour(tree, &mut self.store, i, &mut *base.rng)?;
            last = Some((i, j));

            tree.find_neighbours(&mut self.store, j);
            let tied = self.store.tied_at_min();
            if self.store.neighbours()[..tied].contains(&i) {
                return last;
            }
        }
        last
    }
}

/// Local pivotal engine.
#[derive(Debug)]
pub struct LocalPivotal<'r, R: ?Sized, P> {
    base: BaseSampling<'r, R>,
    pairing: P,
}

impl<'r, R: Rng + ?Sized, P: PairSelection> LocalPivotal<'r, R, P> {
    /// Build an engine spreading the sample in `spread` space.
    pub fn new(
        probabilities: &[f64],
        spread: ArrayView2<'_, f64>,
        pairing: P,
        options: &SamplingOptions,
        rng: &'r mut R,
    ) -> Result<Self> {
        options.validate()?;
        validate::probabilities(probabilities)?;
        validate::rows("spread", spread, probabilities.len())?;
        let base = BaseSampling::new(probabilities, options, rng)
            .with_tree(spread, options.tree_bucket_size);
        Ok(Self { base, pairing })
    }

    /// Let `i` and `j` compete for `p_i + p_j`.
    fn pivot(&mut self, i: usize, j: usize) {
        let pi = self.base.probabilities[i];
        let pj = self.base.probabilities[j];
        let sum = pi + pj;
        let u = self.base.random();

        let (new_i, new_j) = if sum < 1.0 {
            if u * sum < pi {
                (sum, 0.0)
            } else {
                (0.0, sum)
            }
        } else if u * (2.0 - sum) < 1.0 - pj {
            (1.0, sum - 1.0)
        } else {
            (sum - 1.0, 1.0)
        };

        self.base.probabilities[i] = new_i;
        self.base.probabilities[j] = new_j;
        self.base.resolve_unit(i);
        self.base.resolve_unit(j);
    }
}

impl<R: Rng + ?Sized, P: PairSelection> Sampler for LocalPivotal<'_, R, P> {
    fn run(mut self) -> Vec<usize> {
        log::debug!(
            "local pivotal: {} units, {} active after init",
            self.base.probabilities.len(),
            self.base.idx.len()
        );
        while !self.base.is_done() {
            match self.pairing.pair(&mut self.base) {
                Some((i, j)) => self.pivot(i, j),
                None => {
                    // A single unit left (or no tree): plain Bernoulli draw.
                    let id = self.base.idx.get_id(0);
                    let include = self.base.random() < self.base.probabilities[id];
                    self.base.decide_unit(id, include);
                }
            }
        }
        self.base.into_sample()
    }
}

/// Spatially balanced sample by the local pivotal method 1.
pub fn lpm1<R: Rng + ?Sized>(
    probabilities: &[f64],
    spread: ArrayView2<'_, f64>,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(LocalPivotal::new(probabilities, spread, Lpm1::default(), options, rng)?.run())
}

/// Spatially balanced sample by the local pivotal method 2.
pub fn lpm2<R: Rng + ?Sized>(
    probabilities: &[f64],
    spread: ArrayView2<'_, f64>,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(LocalPivotal::new(probabilities, spread, Lpm2::default(), options, rng)?.run())
}
