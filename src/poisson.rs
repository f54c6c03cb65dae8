//! Poisson designs, used as baselines for the spatial designs.

use rand::Rng;

use crate::error::{Result, SamplingError};
use crate::options::SamplingOptions;
use crate::validate;

/// Attempts made by [`conditional_poisson_sampling`] before giving up.
pub const MAX_REJECTIVE_ITERATIONS: usize = 100_000;

/// Independent inclusion of every unit with its own probability.
///
/// Units within `eps` of 0 or 1 are decided without a draw. The result is
/// sorted ascending.
pub fn poisson_sampling<R: Rng + ?Sized>(
    probabilities: &[f64],
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    options.validate()?;
    validate::probabilities(probabilities)?;
    Ok(draw_poisson(probabilities, options.eps, rng))
}

fn draw_poisson<R: Rng + ?Sized>(probabilities: &[f64], eps: f64, rng: &mut R) -> Vec<usize> {
    probabilities
        .iter()
        .enumerate()
        .filter(|&(_, &p)| {
            if p <= eps {
                false
            } else if p >= 1.0 - eps {
                true
            } else {
                rng.random::<f64>() < p
            }
        })
        .map(|(i, _)| i)
        .collect()
}

/// Poisson sampling conditioned on the sample size (rejective sampling).
///
/// Repeats Poisson sampling until exactly `n` units are drawn. The working
/// probabilities are the given ones, so the realized inclusion
/// probabilities only approximate them.
///
/// # Errors
///
/// [`SamplingError::NoConvergence`] if no draw of size `n` turns up within
/// [`MAX_REJECTIVE_ITERATIONS`] attempts. The procedure is random, so a
/// caller may retry, typically with probabilities summing closer to `n`.
pub fn conditional_poisson_sampling<R: Rng + ?Sized>(
    probabilities: &[f64],
    n: usize,
    options: &SamplingOptions,
    rng: &mut R,
) -> Result<Vec<usize>> {
    options.validate()?;
    validate::probabilities(probabilities)?;
    if n == 0 || n > probabilities.len() {
        return Err(SamplingError::InvalidParameter(format!(
            "sample size must be in 1..={} (got {n})",
            probabilities.len()
        )));
    }

    for attempt in 1..=MAX_REJECTIVE_ITERATIONS {
        let sample = draw_poisson(probabilities, options.eps, rng);
        if sample.len() == n {
            log::trace!("conditional poisson: accepted after {attempt} attempts");
            return Ok(sample);
        }
    }

    log::debug!(
        "conditional poisson: no sample of size {n} in {MAX_REJECTIVE_ITERATIONS} attempts"
    );
    Err(SamplingError::NoConvergence {
        iterations: MAX_REJECTIVE_ITERATIONS,
    })
}
