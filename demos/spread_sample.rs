//! Spatial balance of several designs on a clustered population.
//!
//! Every design gets the same equal inclusion probabilities; the spatial
//! designs should score a much lower Voronoi balance than plain Poisson.

use chusen::{
    cube, lcps, local_cube, lpm1, lpm2, poisson_sampling, scps, seeded_rng, spatial_balance,
    SamplingOptions,
};
use ndarray::Array2;
use rand::Rng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Three clusters of uneven size, jittered.
    let mut jitter = seeded_rng(42);
    let centres = [(0.0, 0.0), (20.0, 5.0), (8.0, 25.0)];
    let sizes = [120usize, 60, 20];
    let n: usize = sizes.iter().sum();
    let mut spread = Array2::zeros((n, 2));
    let mut row = 0;
    for (&(cx, cy), &size) in centres.iter().zip(&sizes) {
        for _ in 0..size {
            spread[[row, 0]] = cx + jitter.random_range(-3.0..3.0);
            spread[[row, 1]] = cy + jitter.random_range(-3.0..3.0);
            row += 1;
        }
    }

    let probabilities = vec![0.1; n];
    let balancing = Array2::from_shape_fn((n, 1), |(i, _)| probabilities[i]);
    let options = SamplingOptions::default();
    let mut rng = seeded_rng(7);

    let designs = [
        ("poisson", poisson_sampling(&probabilities, &options, &mut rng)?),
        ("cube", cube(&probabilities, balancing.view(), &options, &mut rng)?),
        (
            "local cube",
            local_cube(&probabilities, balancing.view(), spread.view(), &options, &mut rng)?,
        ),
        ("scps", scps(&probabilities, spread.view(), &options, &mut rng)?),
        ("lcps", lcps(&probabilities, spread.view(), &options, &mut rng)?),
        ("lpm1", lpm1(&probabilities, spread.view(), &options, &mut rng)?),
        ("lpm2", lpm2(&probabilities, spread.view(), &options, &mut rng)?),
    ];

    println!("population: {n} units in {} clusters, E[n] = 20", centres.len());
    println!();
    for (name, sample) in &designs {
        let balance = spatial_balance(sample, &probabilities, spread.view())?;
        let mut per_cluster = [0usize; 3];
        for &id in sample {
            let cluster = if id < sizes[0] {
                0
            } else if id < sizes[0] + sizes[1] {
                1
            } else {
                2
            };
            per_cluster[cluster] += 1;
        }
        println!(
            "{name:>10}: n = {:2}  per cluster = {per_cluster:?}  balance = {balance:.4}",
            sample.len()
        );
    }

    Ok(())
}
