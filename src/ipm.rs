// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module implements the interior-point oracle of the bounding engine:
//! a primal-dual path-following method for the basic Max-Cut relaxation
//!
//! ```text
//!     max { <L, X> : diag(X) = e, X ⪰ 0 }
//! ```
//!
//! The dual iterate `Z = Diag(y) − L` is kept positive definite throughout,
//! so the dual objective `Σ y` returned by the oracle is a valid upper bound
//! even when the iteration cap fires before the target gap is reached.

use crate::error::{Result, SolverError};
use crate::linalg;

/// Relative duality-gap target of the oracle.
const GAP_TOL: f64 = 1e-8;
/// Hard cap on the number of interior-point iterations.
const MAX_ITER: usize = 100;

/// Outcome of the oracle: the relaxation value and the primal matrix.
#[derive(Debug, Clone)]
pub struct IpmSolution {
    /// `max <L, X>` up to the gap tolerance; always an upper bound.
    pub phi: f64,
    /// Primal solution, column-major of order `n`, positive definite with
    /// unit diagonal up to the gap tolerance.
    pub x: Vec<f64>,
}

/// Runs the oracle on the symmetric objective `l` of order `n`.
pub fn solve(l: &[f64], n: usize) -> Result<IpmSolution> {
    if n == 1 {
        return Ok(IpmSolution { phi: l[0], x: vec![1.0] });
    }

    // primal start: the identity; dual start: a diagonally dominant Z
    let mut x = vec![0.0; n * n];
    for i in 0..n {
        x[i + i * n] = 1.0;
    }
    let mut y: Vec<f64> = (0..n)
        .map(|i| {
            let row_abs: f64 = (0..n).map(|j| l[i + j * n].abs()).sum();
            1.1 * row_abs + 0.5
        })
        .collect();
    let mut z = vec![0.0; n * n];
    for j in 0..n {
        for i in 0..n {
            z[i + j * n] = -l[i + j * n];
        }
        z[j + j * n] += y[j];
    }

    let mut phi: f64 = y.iter().sum();
    let mut psi = linalg::frob_inner(l, &x, n);
    let mut mu = linalg::frob_inner(&z, &x, n) / (2.0 * n as f64);

    let mut scratch = vec![0.0; n * n];
    let mut dx = vec![0.0; n * n];

    for _ in 0..MAX_ITER {
        if phi - psi <= GAP_TOL * (1.0 + phi.abs()) {
            break;
        }

        let zi = {
            let mut zi = linalg::inverse(&z, n)?;
            // enforce symmetry lost to roundoff
            for j in 0..n {
                for i in (j + 1)..n {
                    let avg = 0.5 * (zi[i + j * n] + zi[j + i * n]);
                    zi[i + j * n] = avg;
                    zi[j + i * n] = avg;
                }
            }
            zi
        };

        // Newton direction for y from the Hadamard system (Zi o X) dy = rhs
        let mut hadamard = vec![0.0; n * n];
        for idx in 0..n * n {
            hadamard[idx] = zi[idx] * x[idx];
        }
        let rhs: Vec<f64> = (0..n).map(|i| mu * zi[i + i * n] - 1.0).collect();
        let dy = linalg::solve(&hadamard, n, &rhs)?;

        // dX = mu * Zi - X - Zi * Diag(dy) * X, symmetrized
        for j in 0..n {
            for i in 0..n {
                scratch[i + j * n] = zi[i + j * n] * dy[j];
            }
        }
        linalg::mat_mul(&scratch, &x, &mut dx, n);
        for idx in 0..n * n {
            dx[idx] = mu * zi[idx] - x[idx] - dx[idx];
        }
        for j in 0..n {
            for i in (j + 1)..n {
                let avg = 0.5 * (dx[i + j * n] + dx[j + i * n]);
                dx[i + j * n] = avg;
                dx[j + i * n] = avg;
            }
        }

        // back the steps into the cone by repeated factorization probes
        let alpha_p = line_search(&x, &dx, n, &mut scratch)?;
        let alpha_d = line_search_diag(&z, &dy, n, &mut scratch)?;

        for idx in 0..n * n {
            x[idx] += alpha_p * dx[idx];
        }
        for i in 0..n {
            y[i] += alpha_d * dy[i];
            z[i + i * n] += alpha_d * dy[i];
        }

        mu = linalg::frob_inner(&x, &z, n) / (2.0 * n as f64);
        if alpha_p + alpha_d > 1.6 {
            mu *= 0.5;
        }
        if alpha_p + alpha_d > 1.9 {
            mu *= 0.2;
        }

        phi = y.iter().sum();
        psi = linalg::frob_inner(l, &x, n);

        if !phi.is_finite() || !psi.is_finite() {
            return Err(SolverError::Numerical(
                "interior-point iterates diverged".to_string(),
            ));
        }
    }

    Ok(IpmSolution { phi, x })
}

/// Largest fraction of the full step that keeps `m + alpha * dm` positive
/// definite, shrunken geometrically and backed off a final 5%.
fn line_search(m: &[f64], dm: &[f64], n: usize, scratch: &mut [f64]) -> Result<f64> {
    let mut alpha = 1.0;
    loop {
        for idx in 0..n * n {
            scratch[idx] = m[idx] + alpha * dm[idx];
        }
        if linalg::is_positive_definite(&scratch[..n * n], n) {
            break;
        }
        alpha *= 0.8;
        if alpha < 1e-10 {
            return Err(SolverError::Numerical(
                "interior-point line search stalled".to_string(),
            ));
        }
    }
    if alpha < 1.0 {
        alpha *= 0.95;
    }
    Ok(alpha)
}

/// Same as [`line_search`] for a diagonal direction.
fn line_search_diag(m: &[f64], d: &[f64], n: usize, scratch: &mut [f64]) -> Result<f64> {
    let mut alpha = 1.0;
    loop {
        scratch[..n * n].copy_from_slice(&m[..n * n]);
        for i in 0..n {
            scratch[i + i * n] += alpha * d[i];
        }
        if linalg::is_positive_definite(&scratch[..n * n], n) {
            break;
        }
        alpha *= 0.8;
        if alpha < 1e-10 {
            return Err(SolverError::Numerical(
                "interior-point line search stalled".to_string(),
            ));
        }
    }
    if alpha < 1.0 {
        alpha *= 0.95;
    }
    Ok(alpha)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_ipm {
    use super::*;

    #[test]
    fn zero_objective_has_zero_value() {
        let sol = solve(&vec![0.0; 9], 3).unwrap();
        assert!(sol.phi.abs() < 1e-6);
        for i in 0..3 {
            assert!((sol.x[i + i * 3] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn identity_objective_is_trace_bound() {
        // <I, X> = trace(X) = n for every feasible X
        let n = 4;
        let mut l = vec![0.0; n * n];
        for i in 0..n {
            l[i + i * n] = 1.0;
        }
        let sol = solve(&l, n).unwrap();
        assert!((sol.phi - n as f64).abs() < 1e-5);
    }

    #[test]
    fn primal_is_feasible_and_psd() {
        // laplacian of the unit triangle, quarter scaled
        let n = 3;
        let mut l = vec![0.0; n * n];
        let lap = [
            [2.0, -1.0, -1.0],
            [-1.0, 2.0, -1.0],
            [-1.0, -1.0, 2.0],
        ];
        for i in 0..n {
            for j in 0..n {
                l[i + j * n] = 0.25 * lap[i][j];
            }
        }
        let sol = solve(&l, n).unwrap();
        for i in 0..n {
            assert!((sol.x[i + i * n] - 1.0).abs() < 1e-6);
        }
        assert!(crate::linalg::cholesky(&sol.x, n).is_some());
        // known optimum of the triangle relaxation: 9/4
        assert!(sol.phi >= 2.25 - 1e-6);
        assert!(sol.phi <= 2.25 + 1e-4);
    }

    #[test]
    fn value_upper_bounds_every_cut_matrix() {
        // random-ish small symmetric objective with integer entries
        let n = 4;
        let w = [
            [0.0, 3.0, -2.0, 1.0],
            [3.0, 0.0, 4.0, 0.0],
            [-2.0, 4.0, 0.0, 5.0],
            [1.0, 0.0, 5.0, 0.0],
        ];
        let mut l = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                l[i + j * n] = w[i][j];
            }
        }
        let sol = solve(&l, n).unwrap();
        // <L, x x^T> <= phi for every x in {-1, 1}^n
        for bits in 0..(1u32 << n) {
            let x: Vec<f64> = (0..n)
                .map(|i| if bits & (1 << i) != 0 { 1.0 } else { -1.0 })
                .collect();
            let mut val = 0.0;
            for i in 0..n {
                for j in 0..n {
                    val += l[i + j * n] * x[i] * x[j];
                }
            }
            assert!(val <= sol.phi + 1e-6);
        }
    }
}
