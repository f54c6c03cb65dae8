//! Input checks run by every public entry point before any state is touched.

use ndarray::ArrayView2;

use crate::error::{Result, SamplingError};

/// Probabilities must be non-empty, finite and inside `[0, 1]`.
pub(crate) fn probabilities(probabilities: &[f64]) -> Result<()> {
    if probabilities.is_empty() {
        return Err(SamplingError::EmptyPopulation);
    }
    for (index, &value) in probabilities.iter().enumerate() {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(SamplingError::ProbabilityOutOfRange { index, value });
        }
    }
    Ok(())
}

/// A matrix must carry one row per unit.
pub(crate) fn rows(what: &'static str, matrix: ArrayView2<'_, f64>, n: usize) -> Result<()> {
    if matrix.nrows() != n {
        return Err(SamplingError::RowCountMismatch {
            what,
            expected: n,
            actual: matrix.nrows(),
        });
    }
    if let Some(value) = matrix.iter().find(|v| !v.is_finite()) {
        return Err(SamplingError::InvalidParameter(format!(
            "{what} contains a non-finite value ({value})"
        )));
    }
    Ok(())
}

/// A per-unit vector must carry one entry per unit.
pub(crate) fn length(what: &'static str, len: usize, n: usize) -> Result<()> {
    if len != n {
        return Err(SamplingError::LengthMismatch {
            what,
            expected: n,
            actual: len,
        });
    }
    Ok(())
}

/// Persistent random numbers must be uniform draws in `[0, 1)`.
pub(crate) fn random_values(random: &[f64], n: usize) -> Result<()> {
    length("random", random.len(), n)?;
    if let Some((i, v)) = random
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || !(0.0..1.0).contains(*v))
    {
        return Err(SamplingError::InvalidParameter(format!(
            "random value at index {i} must be in [0, 1) (got {v})"
        )));
    }
    Ok(())
}
