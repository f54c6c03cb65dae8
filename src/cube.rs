//! Cube method for balanced sampling.
//!
//! A sample is balanced on the columns of `X` when the Horvitz–Thompson
//! estimate of every column total equals the true total. The cube method
//! walks the vector of working probabilities through the null space of
//! `Xᵀ diag(1/π)` until every coordinate is 0 or 1.
//!
//! - **Flight phase**: while more than `q` units are active, take `q + 1` of
//!   them, find a direction `u` that leaves the balancing totals unchanged and
//!   move randomly along `±u` until some coordinate hits 0 or 1. Each step
//!   decides at least one unit and keeps every `π_i` as the expectation.
//! - **Landing phase**: with `m ≤ q` units left, exact balancing is generally
//!   impossible. The last balancing columns are dropped one by one: the step
//!   runs on the first `m − 1` columns. With a single unit left this is a plain
//!   Bernoulli draw.
//!
//! Which units take part in a flight step is a [`CandidateSelection`]:
//! [`Global`] takes any `q + 1` active units (the original cube method),
//! [`Local`] takes a random unit and its `q` nearest neighbours in a separate
//! spread space (the local cube method), trading exact global balance for
//! spatially well-spread samples.
//!
//! ## References
//!
//! - Deville & Tillé (2004): *Efficient balanced sampling: the cube method*.
//! - Chauvet & Tillé (2006): *A fast algorithm for balanced sampling*.
//! - Grafström & Tillé (2013): *Doubly balanced spatial sampling with spreading
//!   and restitution of auxiliary totals*.

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::base::{BaseSampling, Sampler};
use crate::error::{Result, SamplingError};
use crate::kdtree::KdStore;
use crate::linalg::null_space_vector;
use crate::options::SamplingOptions;
use crate::validate;

/// Strategy picking the units that participate in one flight step.
pub trait CandidateSelection {
    /// Push `size` distinct active units onto `candidates`.
    ///
    /// Called only while more than `size - 1` units are active.
    fn select<R: Rng + ?Sized>(
        &mut self,
        base: &mut BaseSampling<'_, R>,
        size: usize,
        candidates: &mut Vec<usize>,
    );
}

/// Any `size` active units, in index-list order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

impl CandidateSelection for Global {
    fn select<R: Rng + ?Sized>(
        &mut self,
        base: &mut BaseSampling<'_, R>,
        size: usize,
        candidates: &mut Vec<usize>,
    ) {
        candidates.extend(base.idx.iter().take(size));
    }
}

/// A random active unit plus its `size - 1` nearest active neighbours.
///
/// When ties at the boundary distance would give more neighbours than needed,
/// the tied units are subsampled uniformly.
///
/// # Panics
///
/// `select` panics if the engine was built without a k-d tree
/// ([`Cube::new_local`] always attaches one).
#[derive(Debug, Clone, Default)]
pub struct Local {
    store: KdStore,
    tied: Vec<usize>,
}

impl CandidateSelection for Local {
    fn select<R: Rng + ?Sized>(
        &mut self,
        base: &mut BaseSampling<'_, R>,
        size: usize,
        candidates: &mut Vec<usize>,
    ) {
        let id = base.draw_unit();
        candidates.push(id);
        let wanted = size - 1;
        if wanted == 0 {
            return;
        }

        let tree = base
            .tree
            .as_ref()
            .expect("Local::select: engine has no k-d tree attached");

        self.store.set_k(wanted);
        tree.find_neighbours(&mut self.store, id);
        let neighbours = self.store.neighbours();
        if neighbours.len() <= wanted {
            candidates.extend_from_slice(neighbours);
            return;
        }

        let boundary = self.store.max_distance();
        let sure = self
            .store
            .distances()
            .iter()
            .take_while(|&&d| d < boundary)
            .count();
        candidates.extend_from_slice(&neighbours[..sure]);

        self.tied.clear();
        self.tied.extend_from_slice(&neighbours[sure..]);
        for i in 0..wanted - sure {
            let j = base.rng.random_range(i..self.tied.len());
            self.tied.swap(i, j);
            candidates.push(self.tied[i]);
        }
    }
}

/// Cube method engine, generic over the candidate selection.
#[derive(Debug)]
pub struct Cube<'r, R: ?Sized, S> {
    base: BaseSampling<'r, R>,
    selection: S,
    amat: Array2<f64>,
    candidates: Vec<usize>,
}

impl<'r, R: Rng + ?Sized> Cube<'r, R, Global> {
    /// The global cube method.
    pub fn new(
        probabilities: &[f64],
        balancing: ArrayView2<'_, f64>,
        options: &SamplingOptions,
        rng: &'r mut R,
    ) -> Result<Self> {
        validate_inputs(probabilities, balancing, options)?;
        let base = BaseSampling::new(probabilities, options, rng);
        Ok(Self::with_selection(base, probabilities, balancing, Global))
    }
}

impl<'r, R: Rng + ?Sized> Cube<'r, R, Local> {
    /// The local cube method, spreading the sample in `spread` space.
    pub fn new_local(
        probabilities: &[f64],
        balancing: ArrayView2<'_, f64>,
        spread: ArrayView2<'_, f64>,
        options: &SamplingOptions,
        rng: &'r mut R,
    ) -> Result<Self> {
        validate_inputs(probabilities, balancing, options)?;
        validate::rows("spread", spread, probabilities.len())?;
        let base = BaseSampling::new(probabilities, options, rng)
            .with_tree(spread, options.tree_bucket_size);
        Ok(Self::with_selection(
            base,
            probabilities,
            balancing,
            Local::default(),
        ))
    }
}

impl<'r, R: Rng + ?Sized, S: CandidateSelection> Cube<'r, R, S> {
    fn with_selection(
        base: BaseSampling<'r, R>,
        probabilities: &[f64],
        balancing: ArrayView2<'_, f64>,
        selection: S,
    ) -> Self {
        let eps = base.eps;
        let mut amat = balancing.to_owned();
        for (mut row, &p) in amat.rows_mut().into_iter().zip(probabilities) {
            if p > eps {
                row.mapv_inplace(|x| x / p);
            } else {
                row.fill(0.0);
            }
        }
        let q = amat.ncols();
        Self {
            base,
            selection,
            amat,
            candidates: Vec::with_capacity(q + 1),
        }
    }

    fn balancing_columns(&self) -> usize {
        self.amat.ncols()
    }

    fn flight(&mut self) {
        let q = self.balancing_columns();
        while self.base.idx.len() > q {
            self.candidates.clear();
            self.selection
                .select(&mut self.base, q + 1, &mut self.candidates);
            self.update(q);
        }
    }

    fn landing(&mut self) {
        while !self.base.is_done() {
            let m = self.base.idx.len();
            self.candidates.clear();
            self.candidates.extend(self.base.idx.iter());
            self.update(m - 1);
        }
    }

    /// One random step on the current candidates, balancing on the first
    /// `columns` balancing variables.
    fn update(&mut self, columns: usize) {
        let eps = self.base.eps;
        let cols = self.candidates.len();
        let rows = columns.min(cols.saturating_sub(1));

        let mut b = Array2::zeros((rows, cols));
        for (c, &id) in self.candidates.iter().enumerate() {
            for k in 0..rows {
                b[[k, c]] = self.amat[[id, k]];
            }
        }
        let u = null_space_vector(&mut b, eps).unwrap_or_else(|| {
            let mut e = vec![0.0; cols];
            e[0] = 1.0;
            e
        });

        // Largest steps along +u (lambda1) and -u (lambda2), and the
        // candidate that reaches a boundary first in each direction.
        let mut lambda1 = (f64::INFINITY, 0);
        let mut lambda2 = (f64::INFINITY, 0);
        for (c, (&id, &uc)) in self.candidates.iter().zip(&u).enumerate() {
            let p = self.base.probabilities[id];
            let (up, down) = if uc > 0.0 {
                ((1.0 - p) / uc, p / uc)
            } else if uc < 0.0 {
                (p / -uc, (1.0 - p) / -uc)
            } else {
                continue;
            };
            if up < lambda1.0 {
                lambda1 = (up, c);
            }
            if down < lambda2.0 {
                lambda2 = (down, c);
            }
        }

        let go_up = self.base.random() * (lambda1.0 + lambda2.0) < lambda2.0;
        let (lambda, hit) = if go_up {
            (lambda1.0, lambda1.1)
        } else {
            (-lambda2.0, lambda2.1)
        };

        for (c, (&id, &uc)) in self.candidates.iter().zip(&u).enumerate() {
            let p = &mut self.base.probabilities[id];
            *p = (*p + lambda * uc).clamp(0.0, 1.0);
            if c == hit {
                *p = p.round();
            }
        }

        for &id in &self.candidates {
            self.base.resolve_unit(id);
        }
    }
}

impl<R: Rng + ?Sized, S: CandidateSelection> Sampler for Cube<'_, R, S> {
    fn run(mut self) -> Vec<usize> {
        log::debug!(
            "cube: {} units, {} balancing variables, {} active after init",
            self.amat.nrows(),
            self.balancing_columns(),
            self.base.idx.len()
        );
        self.flight();
        log::trace!("cube: landing with {} active units", self.base.idx.len());
        self.landing();
        self.base.into_sample()
    }
}

fn validate_inputs(
    probabilities: &[f64],
    balancing: ArrayView2<'_, f64>,
    options: &SamplingOptions,
) -> Result<()> {
    options.validate()?;
    validate::probabilities(probabilities)?;
    validate::rows("balancing", balancing, probabilities.len())?;
    if balancing.ncols() == 0 {
        return Err(SamplingError::NoBalancingVariables);
    }
    Ok(())
}

/// Balanced sample by the cube method.
///
/// `balancing` holds one row of balancing variables per unit. Returns the
/// selected ids in decision order.
pub fn cube<R: Rng + ?Sized>(
    probabilities: &[f64],
    balancing: ArrayView2<'_, f64>,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(Cube::new(probabilities, balancing, options, rng)?.run())
}

/// Balanced and spatially spread sample by the local cube method.
///
/// Each flight step balances a random unit together with its nearest
/// neighbours in `spread` space.
pub fn local_cube<R: Rng + ?Sized>(
    probabilities: &[f64],
    balancing: ArrayView2<'_, f64>,
    spread: ArrayView2<'_, f64>,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    Ok(Cube::new_local(probabilities, balancing, spread, options, rng)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn column(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).expect("shape matches")
    }

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
    fn ones_column_fixes_sample_size_for_equal_probabilities() {
        let probs = [0.4; 5];
        let ones = Array2::ones((5, 1));
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let s = cube(&probs, ones.view(), &SamplingOptions::default(), &mut rng)
                .expect("valid");
            assert_eq!(s.len(), 2, "seed {seed}: {s:?}");
        }
    }

    #[test]
    fn probability_column_fixes_size_through_landing() {
        let probs = [0.2, 0.5, 0.7, 0.3, 0.6, 0.4, 0.3];
        let x = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0];
        let balancing =
            Array2::from_shape_fn((7, 2), |(i, k)| if k == 0 { probs[i] } else { x[i] });
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let s = cube(&probs, balancing.view(), &SamplingOptions::default(), &mut rng)
                .expect("valid");
            assert_eq!(s.len(), 3);
            let mut sorted = s.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 3);
        }
    }

    #[test]
    fn inclusion_frequencies_match_probabilities() {
        let probs = [0.1, 0.9, 0.5, 0.3, 0.7, 0.5];
        let balancing = column(&probs);
        let reps = 4_000;
        let mut counts = [0usize; 6];
        let opts = SamplingOptions::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..reps {
            for id in cube(&probs, balancing.view(), &opts, &mut rng).expect("valid") {
                counts[id] += 1;
            }
        }
        for (i, &c) in counts.iter().enumerate() {
            let freq = c as f64 / reps as f64;
            assert!((freq - probs[i]).abs() < 0.04, "unit {i}: {freq} vs {}", probs[i]);
        }
    }

    #[test]
    fn boundary_units_are_respected() {
        let probs = [1.0, 0.0, 0.5, 0.5];
        let balancing = column(&probs);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let s =
            cube(&probs, balancing.view(), &SamplingOptions::default(), &mut rng).expect("valid");
        assert!(s.contains(&0));
        assert!(!s.contains(&1));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn local_cube_fixes_size_and_spreads() {
        let spread = grid(6);
        let probs = vec![0.25; 36];
        let balancing = column(&probs);
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let s = local_cube(
                &probs,
                balancing.view(),
                spread.view(),
                &SamplingOptions::default().with_tree_bucket_size(4),
                &mut rng,
            )
            .expect("valid");
            assert_eq!(s.len(), 9);
        }
    }

    #[test]
    fn local_selection_subsamples_ties() {
        let spread = array![[0.0, 0.0], [1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]];
        let probs = [0.5; 5];
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut base = BaseSampling::new(&probs, &SamplingOptions::default(), &mut rng)
            .with_tree(spread.view(), 2);
        let mut local = Local::default();
        let mut candidates = Vec::new();
        for _ in 0..20 {
            candidates.clear();
            local.select(&mut base, 3, &mut candidates);
            assert_eq!(candidates.len(), 3);
            let mut unique = candidates.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    #[should_panic(expected = "no k-d tree attached")]
    fn local_selection_requires_a_tree() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut base = BaseSampling::new(&[0.5; 4], &SamplingOptions::default(), &mut rng);
        let mut candidates = Vec::new();
        Local::default().select(&mut base, 2, &mut candidates);
    }

    #[test]
    fn validation_errors() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let opts = SamplingOptions::default();
        let probs = [0.5, 0.5, 0.5];

        let short = Array2::ones((2, 1));
        assert_eq!(
            cube(&probs, short.view(), &opts, &mut rng),
            Err(SamplingError::RowCountMismatch {
                what: "balancing",
                expected: 3,
                actual: 2
            })
        );

        let empty = Array2::<f64>::zeros((3, 0));
        assert_eq!(
            cube(&probs, empty.view(), &opts, &mut rng),
            Err(SamplingError::NoBalancingVariables)
        );

        let ones = Array2::ones((3, 1));
        assert!(matches!(
            cube(&[0.5, 1.2, 0.5], ones.view(), &opts, &mut rng),
            Err(SamplingError::ProbabilityOutOfRange { index: 1, .. })
        ));

        let spread = Array2::zeros((4, 2));
        assert!(matches!(
            local_cube(&probs, ones.view(), spread.view(), &opts, &mut rng),
            Err(SamplingError::RowCountMismatch { what: "spread", .. })
        ));
    }
}
