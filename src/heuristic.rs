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

//! This module produces lower bounds: it rounds the SDP primal into an
//! integral cut by random hyperplanes, forces the vertices already fixed by
//! branching, and polishes the result with a 1-opt local search.
//!
//! The rounding is pluggable: the solver takes any [`Heuristic`]
//! implementation and defaults to the built-in [`GoemansWilliamson`].

use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::common::BabNode;
use crate::error::{Result, SolverError};
use crate::linalg;
use crate::problem::{cut_value, Problem};

/// A lower-bound producer: fills `x` (over the free vertices of the master
/// problem) with an integral cut consistent with what the search fixed, and
/// returns its value.
pub trait Heuristic: Send + Sync {
    /// `sp` is the master problem, `pp` the node subproblem, `x_mat` the SDP
    /// primal of `pp`; `x` arrives pre-filled with the fixed entries.
    fn run(
        &self,
        sp: &Problem,
        pp: &Problem,
        node: &BabNode,
        x_mat: &[f64],
        x: &mut [u8],
        rng: &mut SmallRng,
    ) -> Result<f64>;
}

/// The built-in rounding: `pp.n` random hyperplanes through the Cholesky
/// factor of the primal, then 1-opt.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoemansWilliamson;

impl Heuristic for GoemansWilliamson {
    fn run(
        &self,
        sp: &Problem,
        pp: &Problem,
        node: &BabNode,
        x_mat: &[f64],
        x: &mut [u8],
        rng: &mut SmallRng,
    ) -> Result<f64> {
        let n = pp.n;

        // X = Z Zᵀ; the primal is an interior iterate so this only fails on
        // roundoff, which a tiny diagonal shift absorbs
        let z = match linalg::cholesky(x_mat, n) {
            Some(z) => z,
            None => {
                let mut shifted = x_mat.to_vec();
                for i in 0..n {
                    shifted[i + i * n] += 1e-9 * n as f64;
                }
                linalg::cholesky(&shifted, n).ok_or_else(|| {
                    SolverError::Numerical("primal matrix lost positive definiteness".to_string())
                })?
            }
        };

        let free: Vec<usize> = (0..sp.nb_free()).filter(|i| !node.xfixed[*i]).collect();

        let mut best_value = f64::NEG_INFINITY;
        let mut best = x.to_vec();
        let mut candidate = x.to_vec();
        let mut r = vec![0.0; n];
        let mut side = vec![false; n];

        for _ in 0..n {
            for v in r.iter_mut() {
                *v = rng.sample(StandardNormal);
            }
            // side of the hyperplane, row by row of the factor
            for (i, s) in side.iter_mut().enumerate() {
                let mut dot = 0.0;
                for j in 0..=i {
                    dot += z[i + j * n] * r[j];
                }
                *s = dot >= 0.0;
            }
            // the last row is the aggregated reference vertex, which must
            // evaluate at +1: a free vertex on its side of the hyperplane
            // rounds to 1
            let reference = side[n - 1];
            for (sub, &vertex) in free.iter().enumerate() {
                candidate[vertex] = u8::from(side[sub] == reference);
            }
            let value = cut_value(sp, &candidate);
            if value > best_value {
                best_value = value;
                best.copy_from_slice(&candidate);
            }
        }

        x.copy_from_slice(&best);
        Ok(mc_1opt(x, sp))
    }
}

/// 1-opt local search: repeatedly flips the single vertex whose flip yields
/// the largest strictly positive improvement of the cut value. The vertex
/// fixed to side 0 by the input convention never flips; any other vertex may,
/// because any integral cut is a valid global lower bound.
pub fn mc_1opt(x: &mut [u8], sp: &Problem) -> f64 {
    let n1 = sp.n;
    let mut v = vec![1.0; n1];
    for (i, xi) in x.iter().enumerate() {
        v[i] = 2.0 * (*xi as f64) - 1.0;
    }

    // s = L v, maintained incrementally across flips
    let mut s = vec![0.0; n1];
    linalg::symv(&sp.l, n1, &v, &mut s);

    loop {
        let mut best_gain = 1e-10;
        let mut best_vertex = None;
        for i in 0..n1 - 1 {
            let gain = -v[i] * (s[i] - sp.l[i + i * n1] * v[i]);
            if gain > best_gain {
                best_gain = gain;
                best_vertex = Some(i);
            }
        }
        let Some(i) = best_vertex else { break };
        let delta = -2.0 * v[i];
        v[i] = -v[i];
        for j in 0..n1 {
            s[j] += sp.l[j + i * n1] * delta;
        }
    }

    for i in 0..n1 - 1 {
        x[i] = u8::from(v[i] > 0.0);
    }
    cut_value(sp, x)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
