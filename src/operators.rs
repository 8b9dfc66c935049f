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

//! This module stores the active cutting planes and applies the cut operator
//! `B` and its adjoint `Bᵀ`.
//!
//! Every inequality is kept in the form `B_i(X) ≤ 1`. Triangle inequalities
//! are signed sums of three off-diagonal entries. Pentagonal and heptagonal
//! inequalities come from `<H, X> ≥ 1` with `H = e eᵀ` for a sign vector `e`;
//! rewritten through the unit diagonal they become `−s · Σ_{p<q} e_p e_q
//! X_{pq} ≤ 1` with `s = ½` for pentagons and `s = ⅓` for heptagons. The
//! `kind` discriminator selects how many leading entries of `e` are negative.

use crate::error::{Result, SolverError};
use crate::common::{MAX_TRIANGLE_CUTS, MAX_PENTAGON_CUTS, MAX_HEPTAGON_CUTS};

/// Multipliers below this threshold mark a cut as inactive; the separator
/// prunes such cuts from the active set.
pub const GAMMA_PRUNE: f64 = 1e-4;

/// Sign triples `(s_ij, s_ik, s_jk)` of the four triangle inequality kinds.
const TRIANGLE_SIGNS: [[f64; 3]; 4] = [
    [-1.0, -1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0],
];

// ----------------------------------------------------------------------------
// --- INEQUALITY RECORDS -----------------------------------------------------
// ----------------------------------------------------------------------------

/// An active triangle inequality on the sorted triple `i < j < k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleInequality {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    /// Sign pattern, 1..=4.
    pub kind: u8,
    /// Cached violation at the X it was last evaluated on.
    pub value: f64,
    /// Dual multiplier; zero while the cut is not priced.
    pub y: f64,
}

/// An active pentagonal inequality over five distinct vertices. The order of
/// `vertices` matters: position `p` carries sign `e_p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PentagonInequality {
    /// Sign pattern, 1..=3 (`kind − 1` leading negative entries).
    pub kind: u8,
    pub vertices: [usize; 5],
    pub value: f64,
    pub y: f64,
}

/// An active heptagonal inequality over seven distinct vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeptagonInequality {
    /// Sign pattern, 1..=4 (`kind − 1` leading negative entries).
    pub kind: u8,
    pub vertices: [usize; 7],
    pub value: f64,
    pub y: f64,
}

/// Evaluates the left-hand side `B(X)` of a triangle inequality.
pub fn triangle_lhs(x: &[f64], n: usize, kind: u8, i: usize, j: usize, k: usize) -> f64 {
    let s = &TRIANGLE_SIGNS[(kind - 1) as usize];
    s[0] * x[i + j * n] + s[1] * x[i + k * n] + s[2] * x[j + k * n]
}

/// Evaluates the left-hand side `B(X)` of a pentagonal or heptagonal
/// inequality: `−scale · Σ_{p<q} e_p e_q X_{v_p, v_q}`.
pub fn clique_lhs(x: &[f64], n: usize, scale: f64, negatives: usize, verts: &[usize]) -> f64 {
    let sign = |p: usize| if p < negatives { -1.0 } else { 1.0 };
    let mut sum = 0.0;
    for p in 0..verts.len() {
        for q in (p + 1)..verts.len() {
            sum += sign(p) * sign(q) * x[verts[p] + verts[q] * n];
        }
    }
    -scale * sum
}

impl TriangleInequality {
    /// `B(X) − 1`, positive iff the inequality is violated at `X`.
    pub fn violation(&self, x: &[f64], n: usize) -> f64 {
        triangle_lhs(x, n, self.kind, self.i, self.j, self.k) - 1.0
    }
}

impl PentagonInequality {
    pub fn violation(&self, x: &[f64], n: usize) -> f64 {
        clique_lhs(x, n, 0.5, (self.kind - 1) as usize, &self.vertices) - 1.0
    }
}

impl HeptagonInequality {
    pub fn violation(&self, x: &[f64], n: usize) -> f64 {
        clique_lhs(x, n, 1.0 / 3.0, (self.kind - 1) as usize, &self.vertices) - 1.0
    }
}

// ----------------------------------------------------------------------------
// --- CUT POOL ---------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The active cutting planes of the current subproblem. Multipliers, operator
/// rows and subgradient entries are laid out triangles first, then pentagons,
/// then heptagons.
#[derive(Debug, Clone, Default)]
pub struct CutPool {
    pub triangles: Vec<TriangleInequality>,
    pub pentagons: Vec<PentagonInequality>,
    pub heptagons: Vec<HeptagonInequality>,
}

impl CutPool {
    /// Total number of active cuts, i.e. the dimension `m` of the dual.
    pub fn len(&self) -> usize {
        self.triangles.len() + self.pentagons.len() + self.heptagons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.triangles.clear();
        self.pentagons.clear();
        self.heptagons.clear();
    }

    /// Rebuilds the dual vector from the multipliers stored on the cuts.
    pub fn load_multipliers(&self, gamma: &mut Vec<f64>) {
        gamma.clear();
        gamma.extend(self.triangles.iter().map(|c| c.y));
        gamma.extend(self.pentagons.iter().map(|c| c.y));
        gamma.extend(self.heptagons.iter().map(|c| c.y));
    }

    /// Fails when any family outgrew its capacity.
    pub fn check_capacity(&self) -> Result<()> {
        if self.triangles.len() > MAX_TRIANGLE_CUTS
            || self.pentagons.len() > MAX_PENTAGON_CUTS
            || self.heptagons.len() > MAX_HEPTAGON_CUTS
        {
            return Err(SolverError::Capacity("active cut list overflow".to_string()));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// --- OPERATORS --------------------------------------------------------------
// ----------------------------------------------------------------------------

/// Applies the cut operator: `y ← y − B(X)`, one entry per active cut.
pub fn op_b(pool: &CutPool, y: &mut [f64], x: &[f64], n: usize) {
    let mut row = 0;
    for cut in &pool.triangles {
        y[row] -= triangle_lhs(x, n, cut.kind, cut.i, cut.j, cut.k);
        row += 1;
    }
    for cut in &pool.pentagons {
        y[row] -= clique_lhs(x, n, 0.5, (cut.kind - 1) as usize, &cut.vertices);
        row += 1;
    }
    for cut in &pool.heptagons {
        y[row] -= clique_lhs(x, n, 1.0 / 3.0, (cut.kind - 1) as usize, &cut.vertices);
        row += 1;
    }
}

/// Applies the adjoint: `X ← X − Bᵀ(γ)`. Every off-diagonal pair receives
/// half of the coefficient on each of its two entries.
pub fn op_bt(pool: &CutPool, x: &mut [f64], n: usize, gamma: &[f64]) {
    let mut row = 0;
    for cut in &pool.triangles {
        let s = &TRIANGLE_SIGNS[(cut.kind - 1) as usize];
        let t = 0.5 * gamma[row];
        add_pair(x, n, cut.i, cut.j, -s[0] * t);
        add_pair(x, n, cut.i, cut.k, -s[1] * t);
        add_pair(x, n, cut.j, cut.k, -s[2] * t);
        row += 1;
    }
    for cut in &pool.pentagons {
        // 0.5 from the symmetric split and 0.5 from the -1/2 row scaling
        add_clique(x, n, 0.25 * gamma[row], (cut.kind - 1) as usize, &cut.vertices);
        row += 1;
    }
    for cut in &pool.heptagons {
        // 0.5 from the symmetric split and 1/3 from the -1/3 row scaling
        add_clique(x, n, gamma[row] / 6.0, (cut.kind - 1) as usize, &cut.vertices);
        row += 1;
    }
}

fn add_pair(x: &mut [f64], n: usize, i: usize, j: usize, v: f64) {
    x[i + j * n] += v;
    x[j + i * n] += v;
}

fn add_clique(x: &mut [f64], n: usize, t: f64, negatives: usize, verts: &[usize]) {
    let sign = |p: usize| if p < negatives { -1.0 } else { 1.0 };
    for p in 0..verts.len() {
        for q in (p + 1)..verts.len() {
            add_pair(x, n, verts[p], verts[q], sign(p) * sign(q) * t);
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_operators {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn rank_one(n: usize, rng: &mut SmallRng) -> Vec<f64> {
        let x: Vec<f64> = (0..n).map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 }).collect();
        let mut m = vec![0.0; n * n];
        for j in 0..n {
            for i in 0..n {
                m[i + j * n] = x[i] * x[j];
            }
        }
        m
    }

    #[test]
    fn every_triangle_kind_is_valid_on_cut_matrices() {
        let n = 6;
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let m = rank_one(n, &mut rng);
            for kind in 1..=4u8 {
                for i in 0..n {
                    for j in (i + 1)..n {
                        for k in (j + 1)..n {
                            assert!(triangle_lhs(&m, n, kind, i, j, k) <= 1.0 + 1e-12);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn pentagon_and_heptagon_rows_are_valid_on_cut_matrices() {
        let n = 9;
        let mut rng = SmallRng::seed_from_u64(13);
        for _ in 0..50 {
            let m = rank_one(n, &mut rng);
            for kind in 1..=3usize {
                assert!(clique_lhs(&m, n, 0.5, kind - 1, &[0, 2, 4, 6, 8]) <= 1.0 + 1e-12);
            }
            for kind in 1..=4usize {
                assert!(
                    clique_lhs(&m, n, 1.0 / 3.0, kind - 1, &[0, 1, 2, 4, 5, 7, 8]) <= 1.0 + 1e-12
                );
            }
        }
    }

    #[test]
    fn adjoint_is_consistent_with_the_operator() {
        // <B^T(gamma), X> must equal <gamma, B(X)> for arbitrary symmetric X
        let n = 8;
        let mut pool = CutPool::default();
        pool.triangles.push(TriangleInequality { i: 0, j: 2, k: 5, kind: 3, value: 0.0, y: 0.0 });
        pool.triangles.push(TriangleInequality { i: 1, j: 3, k: 4, kind: 1, value: 0.0, y: 0.0 });
        pool.pentagons.push(PentagonInequality {
            kind: 2,
            vertices: [7, 1, 4, 0, 6],
            value: 0.0,
            y: 0.0,
        });
        pool.heptagons.push(HeptagonInequality {
            kind: 4,
            vertices: [0, 1, 2, 3, 4, 5, 6],
            value: 0.0,
            y: 0.0,
        });

        let mut rng = SmallRng::seed_from_u64(21);
        let mut x = vec![0.0; n * n];
        for j in 0..n {
            for i in 0..=j {
                let v: f64 = rng.gen_range(-1.0..1.0);
                x[i + j * n] = v;
                x[j + i * n] = v;
            }
        }
        let gamma = [0.7, -0.3, 1.1, 0.4];

        // b = B(X) recovered through op_b from a zero vector
        let mut b = vec![0.0; 4];
        op_b(&pool, &mut b, &x, n);
        let lhs: f64 = gamma.iter().zip(b.iter()).map(|(g, bi)| g * -bi).sum();

        // B^T(gamma) recovered through op_bt from a zero matrix
        let mut bt = vec![0.0; n * n];
        op_bt(&pool, &mut bt, n, &gamma);
        let rhs: f64 = -bt.iter().zip(x.iter()).map(|(a, b)| a * b).sum::<f64>();

        assert!((lhs - rhs).abs() < 1e-10);
    }

    #[test]
    fn violation_is_positive_exactly_when_the_cut_is_violated() {
        // X with all off-diagonal entries at -1 violates the all-minus kind
        let n = 3;
        let mut x = vec![-1.0; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        let cut = TriangleInequality { i: 0, j: 1, k: 2, kind: 1, value: 0.0, y: 0.0 };
        assert!((cut.violation(&x, n) - 2.0).abs() < 1e-12);

        let ok = TriangleInequality { i: 0, j: 1, k: 2, kind: 2, value: 0.0, y: 0.0 };
        assert!(ok.violation(&x, n) < 0.0);
    }

    #[test]
    fn multipliers_serialize_family_by_family() {
        let mut pool = CutPool::default();
        pool.triangles.push(TriangleInequality { i: 0, j: 1, k: 2, kind: 1, value: 0.0, y: 1.0 });
        pool.pentagons.push(PentagonInequality {
            kind: 1,
            vertices: [0, 1, 2, 3, 4],
            value: 0.0,
            y: 2.0,
        });
        pool.heptagons.push(HeptagonInequality {
            kind: 1,
            vertices: [0, 1, 2, 3, 4, 5, 6],
            value: 0.0,
            y: 3.0,
        });
        let mut gamma = Vec::new();
        pool.load_multipliers(&mut gamma);
        assert_eq!(gamma, vec![1.0, 2.0, 3.0]);
    }
}
