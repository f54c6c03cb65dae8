//! Correlated Poisson sampling: SCPS, LCPS and coordinated SCPS.
//!
//! Units are decided one at a time. After unit `j` is decided with its current
//! probability `π_j`, the difference between the outcome and `π_j` is pushed
//! onto its nearest active neighbours:
//!
//! \[
//! \pi_k \leftarrow \pi_k - w_k (I_j - \pi_j)
//! \]
//!
//! with `Σ w_k = 1` whenever the neighbours can absorb it. Marginal inclusion
//! probabilities are preserved in expectation, the active mass plus the
//! decided outcome is unchanged by every step, and nearby units end up
//! negatively correlated, which spreads the sample in auxiliary space.
//!
//! A weight is bounded so no neighbour leaves `[0, 1]` whatever the outcome:
//! `w_k ≤ min(π_k / (1 - π_j), (1 - π_k) / π_j)`.
//!
//! Two strategies shape a design:
//! - [`VisitOrder`] names the next unit: [`InputOrder`] (lowest active id) or
//!   [`NearestChain`] (nearest remaining neighbour of the unit decided last).
//! - [`Redistribution`] turns the neighbourhood into weights:
//!   [`MaximalWeights`] fills the nearest units first, [`ProportionalWeights`]
//!   spreads the unit weight over the whole local neighbourhood.
//!
//! ## References
//!
//! - Grafström (2012): *Spatially correlated Poisson sampling*.
//! - Prentius (2024): *Locally correlated Poisson sampling*.

use ndarray::ArrayView2;
use rand::Rng;

use crate::base::{BaseSampling, Sampler};
use crate::error::Result;
use crate::index_list::IndexList;
use crate::kdtree::KdStore;
use crate::options::SamplingOptions;
use crate::validate;

/// Largest weight unit `j` may give a neighbour with probability `pk`.
#[inline]
fn max_weight(pj: f64, pk: f64) -> f64 {
    (pk / (1.0 - pj)).min((1.0 - pk) / pj)
}

/// Strategy naming the next unit to decide.
pub trait VisitOrder {
    /// The next active unit. `previous` is the unit decided in the last step.
    ///
    /// Only called while at least one unit is active.
    fn next<R: Rng + ?Sized>(
        &mut self,
        base: &BaseSampling<'_, R>,
        previous: Option<usize>,
    ) -> usize;
}

/// Lowest active id. Ids never reactivate, so the cursor only moves forward.
#[derive(Debug, Clone, Copy, Default)]
struct LowestActive {
    cursor: usize,
}

impl LowestActive {
    fn get(&mut self, idx: &IndexList) -> usize {
        while self.cursor < idx.capacity() && !idx.exists(self.cursor) {
            self.cursor += 1;
        }
        debug_assert!(self.cursor < idx.capacity(), "no active unit left");
        self.cursor
    }
}

/// Units in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputOrder {
    lowest: LowestActive,
}

impl VisitOrder for InputOrder {
    fn next<R: Rng + ?Sized>(&mut self, base: &BaseSampling<'_, R>, _: Option<usize>) -> usize {
        self.lowest.get(&base.idx)
    }
}

/// Start at the lowest id, then always move to the nearest remaining
/// neighbour of the unit just decided (ties go to the lowest id).
#[derive(Debug, Clone, Default)]
pub struct NearestChain {
    lowest: LowestActive,
    store: KdStore,
}

impl VisitOrder for NearestChain {
    fn next<R: Rng + ?Sized>(
        &mut self,
        base: &BaseSampling<'_, R>,
        previous: Option<usize>,
    ) -> usize {
        if let (Some(prev), Some(tree)) = (previous, base.tree.as_ref()) {
            tree.find_neighbours(&mut self.store, prev);
            if let Some(&next) = self.store.neighbours().first() {
                return next;
            }
        }
        self.lowest.get(&base.idx)
    }
}

/// Strategy turning a neighbourhood into redistribution weights.
pub trait Redistribution {
    /// Fill `weights` (parallel to `neighbours`, nearest first) for a unit
    /// with probability `pj`.
    fn weights(&self, pj: f64, neighbours: &[usize], probabilities: &[f64], weights: &mut Vec<f64>);
}

/// Greedy maximal weights: each neighbour, nearest first, takes as much of
/// the remaining unit weight as its bound allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximalWeights;

impl Redistribution for MaximalWeights {
    fn weights(
        &self,
        pj: f64,
        neighbours: &[usize],
        probabilities: &[f64],
        weights: &mut Vec<f64>,
    ) {
        weights.clear();
        let mut remaining = 1.0;
        for &k in neighbours {
            let w = max_weight(pj, probabilities[k]).min(remaining);
            remaining -= w;
            weights.push(w);
        }
    }
}

/// Unit weight shared over the local neighbourhood in proportion to each
/// neighbour's bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalWeights;

impl Redistribution for ProportionalWeights {
    fn weights(
        &self,
        pj: f64,
        neighbours: &[usize],
        probabilities: &[f64],
        weights: &mut Vec<f64>,
    ) {
        weights.clear();
        weights.extend(neighbours.iter().map(|&k| max_weight(pj, probabilities[k])));
        let total: f64 = weights.iter().sum();
        if total > 1.0 {
            for w in weights.iter_mut() {
                *w /= total;
            }
        }
    }
}

/// Correlated Poisson engine.
#[derive(Debug)]
pub struct CorrelatedPoisson<'r, R: ?Sized, O, W> {
    base: BaseSampling<'r, R>,
    order: O,
    redistribution: W,
    random: Option<Vec<f64>>,
    store: KdStore,
    weights: Vec<f64>,
}

/// Spatially correlated Poisson sampling.
pub type Scps<'r, R> = CorrelatedPoisson<'r, R, NearestChain, MaximalWeights>;

/// Locally correlated Poisson sampling.
pub type Lcps<'r, R> = CorrelatedPoisson<'r, R, InputOrder, ProportionalWeights>;

impl<'r, R, O, W> CorrelatedPoisson<'r, R, O, W>
where
    R: Rng + ?Sized,
    O: VisitOrder,
    W: Redistribution,
{
    /// Build an engine from explicit strategies.
    ///
    /// `random`, when given, supplies the uniform draw of every unit instead
    /// of the generator.
    pub fn with_strategies(
        probabilities: &[f64],
        spread: ArrayView2<'_, f64>,
        random: Option<&[f64]>,
        order: O,
        redistribution: W,
        options: &SamplingOptions,
        rng: &'r mut R,
    ) -> Result<Self> {
        options.validate()?;
        validate::probabilities(probabilities)?;
        validate::rows("spread", spread, probabilities.len())?;
        if let Some(random) = random {
            validate::random_values(random, probabilities.len())?;
        }

        let base = BaseSampling::new(probabilities, options, rng)
            .with_tree(spread, options.tree_bucket_size);
        Ok(Self {
            base,
            order,
            redistribution,
            random: random.map(<[f64]>::to_vec),
            store: KdStore::default(),
            weights: Vec::new(),
        })
    }

    /// Decide one unit and push its residual onto its neighbours.
    fn step(&mut self, previous: Option<usize>) -> usize {
        let j = self.order.next(&self.base, previous);
        let pj = self.base.probabilities[j];
        let u = match &self.random {
            Some(random) => random[j],
            None => self.base.random(),
        };
        let include = u < pj;

        match self.base.tree.as_ref() {
            Some(tree) => {
                let probabilities = &self.base.probabilities;
                tree.find_neighbours_weighted(&mut self.store, j, |k| {
                    max_weight(pj, probabilities[k])
                });
            }
            None => self.store.clear(),
        }
        self.redistribution.weights(
            pj,
            self.store.neighbours(),
            &self.base.probabilities,
            &mut self.weights,
        );

        self.base.decide_unit(j, include);

        for (&k, &w) in self.store.neighbours().iter().zip(&self.weights) {
            let p = &mut self.base.probabilities[k];
            *p = if include {
                *p - w * (1.0 - pj)
            } else {
                *p + w * pj
            }
            .clamp(0.0, 1.0);
        }
        for &k in self.store.neighbours() {
            self.base.resolve_unit(k);
        }
        j
    }
}

impl<R, O, W> Sampler for CorrelatedPoisson<'_, R, O, W>
where
    R: Rng + ?Sized,
    O: VisitOrder,
    W: Redistribution,
{
    fn run(mut self) -> Vec<usize> {
        log::debug!(
            "correlated poisson: {} units, {} active after init, coordinated: {}",
            self.base.probabilities.len(),
            self.base.idx.len(),
            self.random.is_some()
        );
        let mut previous = None;
        while !self.base.is_done() {
            previous = Some(self.step(previous));
        }
        self.base.into_sample()
    }
}

/// Spatially correlated Poisson sampling (SCPS).
///
/// Units are visited along a nearest-neighbour chain and each decision is
/// compensated on the nearest remaining units with maximal weights.
pub fn scps<R: Rng + ?Sized>(
    probabilities: &[f64],
    spread: ArrayView2<'_, f64>,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(Scps::with_strategies(
        probabilities,
        spread,
        None,
        NearestChain::default(),
        MaximalWeights,
        options,
        rng,
    )?
    .run())
}

/// Locally correlated Poisson sampling (LCPS).
///
/// Units are visited in input order and each decision is compensated over
/// its local neighbourhood in proportion to what every neighbour can absorb.
pub fn lcps<R: Rng + ?Sized>(
    probabilities: &[f64],
    spread: ArrayView2<'_, f64>,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(Lcps::with_strategies(
        probabilities,
        spread,
        None,
        InputOrder::default(),
        ProportionalWeights,
        options,
        rng,
    )?
    .run())
}

/// SCPS driven by persistent per-unit random numbers.
///
/// `random[i]` in `[0, 1)` replaces the draw of unit `i`, so repeated rounds
/// with the same numbers and similar probabilities select overlapping
/// samples. The generator is not consumed.
pub fn scps_coordinated<R: Rng + ?Sized>(
    probabilities: &[f64],
    spread: ArrayView2<'_, f64>,
    random: &[f64],
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(Scps::with_strategies(
        probabilities,
        spread,
        Some(random),
        NearestChain::default(),
        MaximalWeights,
        options,
        rng,
    )?
    .run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplingError;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid(side: usize) -> Array2<f64> {
        Array2::from_shape_fn((side * side, 2), |(i, d)| {
            if d == 0 {
                (i % side) as f64
            } else {
                (i / side) as f64
            }
        })
    }

    #[test]
    fn maximal_weights_fill_nearest_first() {
        let probs = [0.0, 0.5, 0.2, 0.5];
        let mut w = Vec::new();
        MaximalWeights.weights(0.5, &[1, 2, 3], &probs, &mut w);
        // bounds: 1.0, 0.4, 1.0
        assert_eq!(w, vec![1.0, 0.0, 0.0]);

        MaximalWeights.weights(0.5, &[2, 1, 3], &probs, &mut w);
        assert_abs_diff_eq!(w[0], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 0.6, epsilon = 1e-12);
        assert_eq!(w[2], 0.0);
    }

    #[test]
    fn proportional_weights_sum_to_one() {
        let probs = [0.0, 0.5, 0.2, 0.5];
        let mut w = Vec::new();
        ProportionalWeights.weights(0.5, &[1, 2, 3], &probs, &mut w);
        assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[0], 1.0 / 2.4, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 0.4 / 2.4, epsilon = 1e-12);
    }

    #[test]
    fn nearest_chain_follows_closest_remaining_unit() {
        let spread = array![[0.0], [5.0], [1.0], [1.5], [9.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut base = BaseSampling::new(&[0.5; 5], &SamplingOptions::default(), &mut rng)
            .with_tree(spread.view(), 2);
        let mut chain = NearestChain::default();

        assert_eq!(chain.next(&base, None), 0);
        base.decide_unit(0, false);
        assert_eq!(chain.next(&base, Some(0)), 2);
        base.decide_unit(2, true);
        assert_eq!(chain.next(&base, Some(2)), 3);
        base.decide_unit(3, false);
        assert_eq!(chain.next(&base, Some(3)), 1);
    }

    #[test]
    fn input_order_skips_decided_units() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let probs = [0.0, 0.5, 0.5, 0.5];
        let mut base = BaseSampling::new(&probs, &SamplingOptions::default(), &mut rng);
        let mut order = InputOrder::default();
        assert_eq!(order.next(&base, None), 1);
        base.decide_unit(2, true);
        base.decide_unit(1, true);
        assert_eq!(order.next(&base, Some(1)), 3);
    }

    #[test]
    fn fixed_size_when_probabilities_sum_to_integer() {
        let spread = grid(6);
        let probs = vec![0.25; 36];
        let opts = SamplingOptions::default();
        for seed in 0..100 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let s = scps(&probs, spread.view(), &opts, &mut rng).expect("valid");
            assert_eq!(s.len(), 9, "scps seed {seed}");
            let s = lcps(&probs, spread.view(), &opts, &mut rng).expect("valid");
            assert_eq!(s.len(), 9, "lcps seed {seed}");
        }
    }

    /// Run `engine` step by step; after every decision the active mass plus
    /// the sample size must still equal `total`.
    fn assert_mass_conserved<O, W>(mut engine: CorrelatedPoisson<'_, ChaCha8Rng, O, W>, total: f64)
    where
        O: VisitOrder,
        W: Redistribution,
    {
        let mut previous = None;
        let mut steps = 0;
        while !engine.base.is_done() {
            previous = Some(engine.step(previous));
            steps += 1;
            let active: f64 = engine
                .base
                .idx
                .iter()
                .map(|k| engine.base.probabilities[k])
                .sum();
            let mass = active + engine.base.sample().len() as f64;
            assert_abs_diff_eq!(mass, total, epsilon = 1e-6);
        }
        assert!(steps > 0);
    }

    #[test]
    fn every_step_conserves_probability_mass() {
        let spread = grid(4);
        let probs: Vec<f64> = (0..16).map(|i| [0.1, 0.4, 0.3, 0.2][i % 4]).collect();
        let total: f64 = probs.iter().sum();
        let options = SamplingOptions::default();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let engine = Scps::with_strategies(
                &probs,
                spread.view(),
                None,
                NearestChain::default(),
                MaximalWeights,
                &options,
                &mut rng,
            )
            .expect("valid");
            assert_mass_conserved(engine, total);

            let engine = Lcps::with_strategies(
                &probs,
                spread.view(),
                None,
                InputOrder::default(),
                ProportionalWeights,
                &options,
                &mut rng,
            )
            .expect("valid");
            assert_mass_conserved(engine, total);
        }
    }

    #[test]
    fn scps_inclusion_frequencies_match_probabilities() {
        let spread = grid(3);
        let probs = [0.2, 0.8, 0.5, 0.3, 0.7, 0.1, 0.9, 0.4, 0.1];
        let reps = 4_000;
        let mut counts = [0usize; 9];
        let opts = SamplingOptions::default();
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for _ in 0..reps {
            for id in scps(&probs, spread.view(), &opts, &mut rng).expect("valid") {
                counts[id] += 1;
            }
        }
        for (i, &c) in counts.iter().enumerate() {
            let freq = c as f64 / reps as f64;
            assert!((freq - probs[i]).abs() < 0.04, "unit {i}: {freq} vs {}", probs[i]);
        }
    }

    #[test]
    fn coordinated_ignores_the_generator() {
        let spread = grid(5);
        let probs = vec![0.2; 25];
        let random: Vec<f64> = (0..25).map(|i| ((i * 7) % 25) as f64 / 25.0).collect();
        let mut a = ChaCha8Rng::seed_from_u64(1);
        let mut b = ChaCha8Rng::seed_from_u64(2);
        let opts = SamplingOptions::default();
        let sa = scps_coordinated(&probs, spread.view(), &random, &opts, &mut a).expect("valid");
        let sb = scps_coordinated(&probs, spread.view(), &random, &opts, &mut b).expect("valid");
        assert_eq!(sa, sb);
        assert_eq!(sa.len(), 5);
    }

    #[test]
    fn coordinated_validates_random_values() {
        let spread = grid(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let opts = SamplingOptions::default();
        let err = scps_coordinated(&[0.5; 4], spread.view(), &[0.1, 0.2], &opts, &mut rng);
        assert_eq!(
            err,
            Err(SamplingError::LengthMismatch {
                what: "random",
                expected: 4,
                actual: 2
            })
        );
    }
}
