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

//! This module defines the objective-matrix wrapper shared by the master
//! problem and the per-node subproblems, together with the operations that
//! tie the two levels together: restricting the objective to the free
//! vertices of a node, pricing the already-fixed part, and evaluating an
//! integral cut.
//!
//! Conventions. The master objective `L` has order `N + 1`: `N` free vertices
//! plus one vertex fixed to side 0 which carries, in its last row/column, the
//! edge weights towards the fixed side (with the border sign chosen so that
//! the reference vertex evaluates at `+1`). For an indicator vector
//! `x ∈ {0, 1}^N` the cut value is `¼ vᵀ L v` with `v_i = 2 x_i − 1` and the
//! last entry of `v` pinned to `+1`. Subproblems are ¼-scaled so that
//! `<L_PP, X>` directly measures the free part of the cut; the constant
//! contributed by the fixed vertices is returned by [`fixed_value`].

use crate::common::BabNode;

/// A problem (the master instance or a node subproblem): a symmetric
/// objective matrix in column-major layout.
#[derive(Debug, Clone)]
pub struct Problem {
    /// Column-major symmetric objective matrix of order `n`.
    pub l: Vec<f64>,
    /// Order of the matrix.
    pub n: usize,
}

impl Problem {
    /// Number of freely assignable vertices of this problem (all but the
    /// vertex fixed to side 0 by the input convention).
    pub fn nb_free(&self) -> usize {
        self.n - 1
    }
}

/// Builds the subproblem objective for a node: the master objective restricted
/// to the unfixed vertices, bordered by an aggregated vertex that stands for
/// everything already on a fixed side. The matrix is ¼-scaled and its corner
/// is zero; the constant part lives in [`fixed_value`].
pub fn create_subproblem(node: &BabNode, sp: &Problem) -> Problem {
    let n1 = sp.n;
    let nfree = node.free_count();
    let pn = nfree + 1;

    let free: Vec<usize> = (0..sp.nb_free()).filter(|i| !node.xfixed[*i]).collect();

    let mut l = vec![0.0; pn * pn];
    for (a, &gi) in free.iter().enumerate() {
        for (b, &gj) in free.iter().enumerate() {
            l[a + b * pn] = 0.25 * sp.l[gi + gj * n1];
        }
        // border column: couple the free vertex with the aggregated fixed side
        let mut border = sp.l[gi + (n1 - 1) * n1];
        for (j, fixed) in node.xfixed.iter().enumerate() {
            if *fixed {
                let sign = 2.0 * node.sol.x[j] as f64 - 1.0;
                border += sign * sp.l[gi + j * n1];
            }
        }
        l[a + nfree * pn] = 0.25 * border;
        l[nfree + a * pn] = 0.25 * border;
    }

    Problem { l, n: pn }
}

/// The constant the fixed vertices (and the conventionally fixed last vertex)
/// contribute to the cut value of every completion of `node`.
pub fn fixed_value(node: &BabNode, sp: &Problem) -> f64 {
    let n1 = sp.n;
    // signed assignment over the fixed vertices, the last vertex is +1
    let mut idx = Vec::with_capacity(node.fixed_count() + 1);
    for (j, fixed) in node.xfixed.iter().enumerate() {
        if *fixed {
            idx.push((j, 2.0 * node.sol.x[j] as f64 - 1.0));
        }
    }
    idx.push((n1 - 1, 1.0));

    let mut value = 0.0;
    for &(i, vi) in &idx {
        for &(j, vj) in &idx {
            value += vi * vj * sp.l[i + j * n1];
        }
    }
    0.25 * value
}

/// Evaluates the cut induced by the indicator vector `x` over the master
/// objective.
pub fn cut_value(sp: &Problem, x: &[u8]) -> f64 {
    let n1 = sp.n;
    let mut v = vec![1.0; n1];
    for (i, xi) in x.iter().enumerate() {
        v[i] = 2.0 * (*xi as f64) - 1.0;
    }
    let mut value = 0.0;
    for j in 0..n1 {
        let col = &sp.l[j * n1..j * n1 + n1];
        let vj = v[j];
        for i in 0..n1 {
            value += v[i] * col[i] * vj;
        }
    }
    0.25 * value
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_problem {
    use super::*;
    use crate::instance::problem_from_adjacency;

    /// Adjacency matrix of the unit triangle.
    fn k3() -> Problem {
        let mut adj = vec![0.0; 9];
        for (i, j) in [(0usize, 1usize), (0, 2), (1, 2)] {
            adj[i + j * 3] = 1.0;
            adj[j + i * 3] = 1.0;
        }
        problem_from_adjacency(&adj, 3).unwrap()
    }

    #[test]
    fn cut_values_of_the_triangle() {
        let sp = k3();
        assert_eq!(cut_value(&sp, &[0, 0]), 0.0);
        assert_eq!(cut_value(&sp, &[1, 0]), 2.0);
        assert_eq!(cut_value(&sp, &[0, 1]), 2.0);
        assert_eq!(cut_value(&sp, &[1, 1]), 2.0);
    }

    #[test]
    fn root_subproblem_is_the_quarter_scaled_master() {
        let sp = k3();
        let root = BabNode::root(sp.nb_free());
        let pp = create_subproblem(&root, &sp);
        assert_eq!(pp.n, sp.n);
        for i in 0..sp.n {
            for j in 0..sp.n {
                let expect = if i == sp.n - 1 && j == sp.n - 1 {
                    0.0
                } else {
                    0.25 * sp.l[i + j * sp.n]
                };
                assert!((pp.l[i + j * pp.n] - expect).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn subproblem_plus_fixed_value_reproduces_the_cut() {
        let sp = k3();
        let root = BabNode::root(sp.nb_free());
        // fix vertex 0 to the cut side
        let node = root.child(0, 1, f64::INFINITY);
        let pp = create_subproblem(&node, &sp);
        let fix = fixed_value(&node, &sp);

        // completion: vertex 1 stays on side 0 -> full cut is {0} vs {1, 2}
        // the free part is evaluated through <L_PP, v v^T> with v = (-1, +1)
        let v = [-1.0, 1.0];
        let mut free_part = 0.0;
        for i in 0..2 {
            for j in 0..2 {
                free_part += v[i] * v[j] * pp.l[i + j * 2];
            }
        }
        let total = free_part + fix;
        assert!((total - cut_value(&sp, &[1, 0])).abs() < 1e-12);
    }

    #[test]
    fn fixed_value_of_the_root_is_the_scaled_corner() {
        let sp = k3();
        let root = BabNode::root(sp.nb_free());
        let corner = sp.l[(sp.n - 1) + (sp.n - 1) * sp.n];
        assert!((fixed_value(&root, &sp) - 0.25 * corner).abs() < 1e-12);
    }
}
