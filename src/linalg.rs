//! Null-space direction for the cube method's small `q × (q+1)` systems.
//!
//! Gauss–Jordan elimination with partial pivoting. Entries whose magnitude
//! falls below `eps` times the largest entry are treated as zero, which keeps
//! near rank-deficient systems (few active units, collinear balancing rows)
//! from producing huge directions.

use ndarray::Array2;

/// Reduce `m` to reduced row echelon form in place.
///
/// Returns the pivot column of each non-zero row, in row order.
pub(crate) fn reduced_row_echelon(m: &mut Array2<f64>, eps: f64) -> Vec<usize> {
    let (rows, cols) = m.dim();
    let scale = m.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let tol = eps * scale;

    let mut pivots = Vec::with_capacity(rows.min(cols));
    let mut r = 0;
    for c in 0..cols {
        if r == rows {
            break;
        }

        let mut best = r;
        for i in r + 1..rows {
            if m[[i, c]].abs() > m[[best, c]].abs() {
                best = i;
            }
        }
        if m[[best, c]].abs() <= tol {
            for i in r..rows {
                m[[i, c]] = 0.0;
            }
            continue;
        }

        if best != r {
            for j in 0..cols {
                m.swap([best, j], [r, j]);
            }
        }

        let pivot = m[[r, c]];
        for j in c..cols {
            m[[r, j]] /= pivot;
        }
        for i in 0..rows {
            if i == r {
                continue;
            }
            let f = m[[i, c]];
            if f == 0.0 {
                continue;
            }
            for j in c..cols {
                m[[i, j]] -= f * m[[r, j]];
            }
            m[[i, c]] = 0.0;
        }

        pivots.push(c);
        r += 1;
    }
    pivots
}

/// A non-zero vector `u` with `m u = 0`, computed on the reduced form.
///
/// The first free column is set to 1 and the pivot variables solved for.
/// Returns `None` only if `m` has full column rank, which cannot happen when
/// it has more columns than rows. `m` is overwritten.
pub(crate) fn null_space_vector(m: &mut Array2<f64>, eps: f64) -> Option<Vec<f64>> {
    let cols = m.ncols();
    let pivots = reduced_row_echelon(m, eps);

    let mut is_pivot = vec![false; cols];
    for &c in &pivots {
        is_pivot[c] = true;
    }
    let free = is_pivot.iter().position(|&p| !p)?;

    let mut u = vec![0.0; cols];
    u[free] = 1.0;
    for (r, &c) in pivots.iter().enumerate() {
        u[c] = -m[[r, free]];
    }
    Some(u)
}
