//! Spatial balance of a realized sample.
//!
//! The Voronoi measure (Stevens & Olsen 2004): every population unit hands
//! its inclusion probability to its nearest sampled unit (ties share it
//! equally). In a well-spread sample each sampled unit collects about 1, so
//!
//! \[
//! B = \frac{1}{n} \sum_{j \in s} (v_j - 1)^2
//! \]
//!
//! is small; clustered samples score high.

use ndarray::ArrayView2;

use crate::error::{Result, SamplingError};
use crate::kdtree::NearestNeighbour;
use crate::options::DEFAULT_TREE_BUCKET_SIZE;
use crate::validate;

/// Voronoi spatial-balance measure of `sample` (lower is better, 0 is
/// perfect).
///
/// # Errors
///
/// Fails on an empty sample, an out-of-range or repeated sample id, invalid
/// probabilities, or a `spread` matrix without one row per unit.
pub fn spatial_balance(
    sample: &[usize],
    probabilities: &[f64],
    spread: ArrayView2<'_, f64>,
) -> Result<f64> {
    validate::probabilities(probabilities)?;
    let n = probabilities.len();
    validate::rows("spread", spread, n)?;
    if sample.is_empty() {
        return Err(SamplingError::InvalidParameter(
            "sample is empty".to_string(),
        ));
    }
    let mut seen = vec![false; n];
    for &id in sample {
        if id >= n || seen[id] {
            return Err(SamplingError::InvalidParameter(format!(
                "sample id {id} is out of range or repeated"
            )));
        }
        seen[id] = true;
    }

    let mut nn = NearestNeighbour::new(spread, sample, DEFAULT_TREE_BUCKET_SIZE);
    let mut shares = vec![0.0; n];
    let mut point = Vec::with_capacity(spread.ncols());
    for (row, &p) in spread.rows().into_iter().zip(probabilities) {
        point.clear();
        point.extend(row.iter().copied());
        let nearest = nn.nearest_to_point(&point);
        let share = p / nearest.len() as f64;
        for &j in nearest {
            shares[j] += share;
        }
    }

    let total: f64 = sample.iter().map(|&j| (shares[j] - 1.0).powi(2)).sum();
    Ok(total / sample.len() as f64)
}
