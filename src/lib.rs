//! `chusen`: balanced and spatially balanced sampling from finite populations.
//!
//! Every design draws a sample that respects prescribed first-order inclusion
//! probabilities `π_i`, and additionally:
//!
//! - `cube`: balances Horvitz–Thompson estimates of auxiliary totals
//!   (global and local cube method);
//! - `correlated_poisson`: spreads the sample in auxiliary space by
//!   sequential, spatially correlated Poisson decisions (SCPS, LCPS,
//!   coordinated SCPS);
//! - `pivotal`: spreads the sample through the local pivotal method
//!   (LPM1, LPM2);
//! - `poisson`: plain and conditional Poisson sampling, the baselines the
//!   spatial designs are compared against.
//!
//! Supporting modules:
//! - `index_list`: O(1) active/inactive bookkeeping over unit ids;
//! - `kdtree`: k-d tree with deletion, `KdStore` query scratch and the
//!   `NearestNeighbour` wrapper;
//! - `base`: the unit-decision lifecycle shared by all engines;
//! - `balance`: the Voronoi spatial-balance diagnostic.
//!
//! Generators are always passed in explicitly (`&mut impl Rng`); there is no
//! hidden global source of randomness. Inputs are borrowed immutably, so the
//! caller's probabilities and matrices are never modified.
//!
//! ```
//! use chusen::{local_cube, seeded_rng, SamplingOptions};
//! use ndarray::Array2;
//!
//! let spread = Array2::from_shape_fn((16, 2), |(i, d)| {
//!     if d == 0 {
//!         (i % 4) as f64
//!     } else {
//!         (i / 4) as f64
//!     }
//! });
//! let probabilities = vec![0.25; 16];
//! let balancing = Array2::from_elem((16, 1), 0.25);
//! let mut rng = seeded_rng(1);
//!
//! let options = SamplingOptions::default();
//! let sample = local_cube(&probabilities, balancing.view(), spread.view(), &options, &mut rng)?;
//! assert_eq!(sample.len(), 4);
//! # Ok::<(), chusen::SamplingError>(())
//! ```

#![forbid(unsafe_code)]

pub mod balance;
pub mod base;
pub mod correlated_poisson;
pub mod cube;
pub mod error;
pub mod index_list;
pub mod kdtree;
mod linalg;
pub mod options;
pub mod pivotal;
pub mod poisson;
mod validate;

pub use balance::spatial_balance;
pub use base::{BaseSampling, Sampler};
pub use correlated_poisson::{lcps, scps, scps_coordinated, CorrelatedPoisson};
pub use cube::{cube, local_cube, Cube};
pub use error::{Result, SamplingError};
pub use index_list::IndexList;
pub use kdtree::{KdNode, KdStore, KdTree, NearestNeighbour};
pub use options::{seeded_rng, SamplingOptions};
pub use pivotal::{lpm1, lpm2, LocalPivotal};
pub use poisson::{conditional_poisson_sampling, poisson_sampling};
