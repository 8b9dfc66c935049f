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

//! This module is the dense linear-algebra façade of the solver. Matrices are
//! column-major `&[f64]` slices of order `n` (entry `(i, j)` at `i + j * n`).
//! Factorized solves go through `faer`; the small symmetric kernels that the
//! numerical code calls in its inner loops are written out here so that the
//! rest of the crate never touches an index computation.

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};

use crate::error::{Result, SolverError};

/// Dot product of two vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm of a vector.
pub fn norm2(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Frobenius inner product `<A, B>` of two symmetric matrices of order `n`.
pub fn frob_inner(a: &[f64], b: &[f64], _n: usize) -> f64 {
    dot(a, b)
}

/// Symmetric matrix-vector product `y = A x`.
pub fn symv(a: &[f64], n: usize, x: &[f64], y: &mut [f64]) {
    y[..n].fill(0.0);
    for j in 0..n {
        let xj = x[j];
        let col = &a[j * n..j * n + n];
        for i in 0..n {
            y[i] += col[i] * xj;
        }
    }
}

/// Dense matrix product `C = A * B` (all of order `n`, column-major).
pub fn mat_mul(a: &[f64], b: &[f64], c: &mut [f64], n: usize) {
    c[..n * n].fill(0.0);
    for j in 0..n {
        for k in 0..n {
            let bkj = b[k + j * n];
            if bkj == 0.0 {
                continue;
            }
            let col = &a[k * n..k * n + n];
            let out = &mut c[j * n..j * n + n];
            for i in 0..n {
                out[i] += col[i] * bkj;
            }
        }
    }
}

/// Cholesky factorization `A = Z Zᵀ` with `Z` lower triangular, column-major.
/// Returns `None` when `A` is not (numerically) positive definite, which
/// doubles as the cone-membership probe of the interior-point line search.
pub fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut z = vec![0.0; n * n];
    for j in 0..n {
        let mut diag = a[j + j * n];
        for k in 0..j {
            let zjk = z[j + k * n];
            diag -= zjk * zjk;
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        z[j + j * n] = diag;
        for i in (j + 1)..n {
            let mut v = a[i + j * n];
            for k in 0..j {
                v -= z[i + k * n] * z[j + k * n];
            }
            z[i + j * n] = v / diag;
        }
    }
    Some(z)
}

/// Tells whether `A` is (numerically) positive definite.
pub fn is_positive_definite(a: &[f64], n: usize) -> bool {
    cholesky(a, n).is_some()
}

fn to_mat(a: &[f64], n: usize) -> Mat<f64> {
    let mut mat = Mat::zeros(n, n);
    for j in 0..n {
        for i in 0..n {
            mat.write(i, j, a[i + j * n]);
        }
    }
    mat
}

/// Solves the dense linear system `A x = rhs` through an LU decomposition
/// with partial pivoting. A singular system surfaces as non-finite entries in
/// the solution and is reported as a numerical failure.
pub fn solve(a: &[f64], n: usize, rhs: &[f64]) -> Result<Vec<f64>> {
    let mat = to_mat(a, n);
    let mut b = Mat::zeros(n, 1);
    for i in 0..n {
        b.write(i, 0, rhs[i]);
    }
    let lu = mat.partial_piv_lu();
    let sol = lu.solve(&b);
    let x: Vec<f64> = (0..n).map(|i| sol.read(i, 0)).collect();
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::Numerical("singular linear system".to_string()));
    }
    Ok(x)
}

/// Inverse of a dense matrix of order `n`, through the same pivoted LU.
pub fn inverse(a: &[f64], n: usize) -> Result<Vec<f64>> {
    let mat = to_mat(a, n);
    let mut eye = Mat::zeros(n, n);
    for i in 0..n {
        eye.write(i, i, 1.0);
    }
    let lu = mat.partial_piv_lu();
    let sol = lu.solve(&eye);
    let mut inv = vec![0.0; n * n];
    for j in 0..n {
        for i in 0..n {
            let v = sol.read(i, j);
            if !v.is_finite() {
                return Err(SolverError::Numerical("singular matrix in inversion".to_string()));
            }
            inv[i + j * n] = v;
        }
    }
    Ok(inv)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
