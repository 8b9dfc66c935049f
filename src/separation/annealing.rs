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

//! Small-scale simulated annealing used by the pentagonal and heptagonal
//! separators. For a fixed vertex subset and sign pattern, the violation of
//! the inequality depends on which vertex sits on which sign position; this
//! is a tiny quadratic-assignment search over the permutations of 5 or 7
//! elements, explored with swap moves and geometric cooling.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::operators::clique_lhs;

/// Initial temperature of the annealing schedule.
const START_TEMP: f64 = 0.5;
/// Geometric cooling factor applied after every move.
const COOLING: f64 = 0.95;
/// Swap moves attempted per position of the permutation.
const MOVES_PER_POSITION: usize = 40;

/// Refines the assignment of `verts` to the sign positions of the inequality
/// (`negatives` leading minus signs, rows scaled by `scale`) so as to
/// maximize the violation. On return `verts` holds the best permutation
/// found; the returned value is its violation `B(X) − 1`.
pub fn refine_assignment(
    x: &[f64],
    n: usize,
    scale: f64,
    negatives: usize,
    verts: &mut [usize],
    rng: &mut SmallRng,
) -> f64 {
    let len = verts.len();
    let mut current = clique_lhs(x, n, scale, negatives, verts);
    let mut best = current;
    let mut best_perm = verts.to_vec();

    let mut temp = START_TEMP;
    for _ in 0..MOVES_PER_POSITION * len {
        let p = rng.gen_range(0..len);
        let q = rng.gen_range(0..len);
        if p == q {
            temp *= COOLING;
            continue;
        }
        verts.swap(p, q);
        let candidate = clique_lhs(x, n, scale, negatives, verts);
        let delta = candidate - current;
        if delta >= 0.0 || rng.gen::<f64>() < (delta / temp).exp() {
            current = candidate;
            if current > best {
                best = current;
                best_perm.copy_from_slice(verts);
            }
        } else {
            verts.swap(p, q);
        }
        temp *= COOLING;
    }

    verts.copy_from_slice(&best_perm);
    best - 1.0
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
