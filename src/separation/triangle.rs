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

//! Separation of triangle inequalities: prune the active cuts whose
//! multiplier collapsed, enumerate all triples and sign kinds keeping the
//! most violated candidates, and merge them into the active set.

use std::cmp::Ordering;

use binary_heap_plus::BinaryHeap;
use compare::Compare;
use fxhash::FxHashSet;

use crate::common::MAX_TRIANGLE_CUTS;
use crate::operators::{triangle_lhs, CutPool, TriangleInequality, GAMMA_PRUNE};
use crate::params::Parameters;
use crate::separation::SeparationUpdate;

/// A candidate produced by the enumeration.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    i: usize,
    j: usize,
    k: usize,
    kind: u8,
    violation: f64,
}

/// Comparator that makes the *least* violated candidate the top of the heap,
/// so a full heap evicts its weakest element in O(log K).
struct LeastViolated;
impl Compare<Candidate> for LeastViolated {
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        b.violation.partial_cmp(&a.violation).unwrap_or(Ordering::Equal)
    }
}

/// One triangle separation pass over the current primal matrix `x`.
///
/// The dual vector `gamma` still has the layout of the previous round: the
/// triangle block starts at offset 0.
pub fn update_triangle_inequalities(
    pool: &mut CutPool,
    gamma: &[f64],
    x: &[f64],
    n: usize,
    params: &Parameters,
) -> SeparationUpdate {
    // (1) prune cuts whose multiplier collapsed, refresh the survivors
    let before = pool.triangles.len();
    let mut kept = Vec::with_capacity(before);
    for (idx, cut) in pool.triangles.iter().enumerate() {
        let y = gamma[idx];
        if y > GAMMA_PRUNE {
            let mut cut = *cut;
            cut.y = y;
            cut.value = cut.violation(x, n);
            kept.push(cut);
        }
    }
    let removed = before - kept.len();
    pool.triangles = kept;

    // (2) enumerate every triple and kind, best-K selection
    let mut heap = BinaryHeap::from_vec_cmp(Vec::new(), LeastViolated);
    let mut max_violation: f64 = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                for kind in 1..=4u8 {
                    let violation = triangle_lhs(x, n, kind, i, j, k) - 1.0;
                    if violation <= params.violated_tri_ineq {
                        continue;
                    }
                    max_violation = max_violation.max(violation);
                    if heap.len() < params.tri_ineq {
                        heap.push(Candidate { i, j, k, kind, violation });
                    } else if heap
                        .peek()
                        .map(|weakest| violation > weakest.violation)
                        .unwrap_or(false)
                    {
                        heap.pop();
                        heap.push(Candidate { i, j, k, kind, violation });
                    }
                }
            }
        }
    }

    // (3) merge the candidates, most violated first, skipping duplicates
    let mut candidates = heap.into_vec();
    candidates.sort_unstable_by(|a, b| {
        b.violation.partial_cmp(&a.violation).unwrap_or(Ordering::Equal)
    });

    let active: FxHashSet<(usize, usize, usize, u8)> = pool
        .triangles
        .iter()
        .map(|c| (c.i, c.j, c.k, c.kind))
        .collect();

    let mut added = 0;
    for cand in candidates {
        if pool.triangles.len() >= MAX_TRIANGLE_CUTS {
            break;
        }
        if active.contains(&(cand.i, cand.j, cand.k, cand.kind)) {
            continue;
        }
        pool.triangles.push(TriangleInequality {
            i: cand.i,
            j: cand.j,
            k: cand.k,
            kind: cand.kind,
            value: cand.violation,
            y: 0.0,
        });
        added += 1;
    }

    SeparationUpdate { max_violation, added, removed }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_triangle_separation {
    use super::*;

    /// The matrix with all off-diagonal entries at -1: the all-minus kind of
    /// every triple is violated by 2 and no other kind is violated.
    fn all_minus(n: usize) -> Vec<f64> {
        let mut x = vec![-1.0; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        x
    }

    #[test]
    fn finds_the_violated_kind_on_every_triple() {
        let n = 4;
        let x = all_minus(n);
        let mut pool = CutPool::default();
        let up = update_triangle_inequalities(&mut pool, &[], &x, n, &Parameters::default());
        // 4 triples, one violated kind each
        assert_eq!(up.added, 4);
        assert_eq!(pool.triangles.len(), 4);
        assert!((up.max_violation - 2.0).abs() < 1e-12);
        assert!(pool.triangles.iter().all(|c| c.kind == 1));
        assert!(pool.triangles.iter().all(|c| c.y == 0.0));
        assert!(pool.triangles.iter().all(|c| c.i < c.j && c.j < c.k));
    }

    #[test]
    fn candidate_list_cap_keeps_the_most_violated() {
        let n = 6;
        let mut x = all_minus(n);
        // make the triple (0, 1, 2) stand out
        x[0 + 1 * n] = -2.0;
        x[1 + 0 * n] = -2.0;
        let mut params = Parameters::default();
        params.tri_ineq = 1;
        let mut pool = CutPool::default();
        let up = update_triangle_inequalities(&mut pool, &[], &x, n, &params);
        assert_eq!(up.added, 1);
        let cut = &pool.triangles[0];
        assert_eq!((cut.i, cut.j), (0, 1));
        assert!((cut.value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn priced_cuts_survive_and_unpriced_cuts_are_pruned() {
        let n = 4;
        let x = all_minus(n);
        let mut pool = CutPool::default();
        update_triangle_inequalities(&mut pool, &[], &x, n, &Parameters::default());
        let m = pool.triangles.len();

        // price the first cut only
        let mut gamma = vec![0.0; m];
        gamma[0] = 0.5;
        let up = update_triangle_inequalities(&mut pool, &gamma, &x, n, &Parameters::default());
        assert_eq!(up.removed, m - 1);
        // the pruned cuts are violated again, so they re-enter as candidates
        assert_eq!(pool.triangles.len(), m);
        assert_eq!(pool.triangles.iter().filter(|c| c.y > 0.0).count(), 1);
    }

    #[test]
    fn no_duplicate_is_ever_merged() {
        let n = 5;
        let x = all_minus(n);
        let mut pool = CutPool::default();
        update_triangle_inequalities(&mut pool, &[], &x, n, &Parameters::default());
        let m = pool.triangles.len();
        // keep everything priced, separate again: all candidates are dups
        let gamma = vec![1.0; m];
        let up = update_triangle_inequalities(&mut pool, &gamma, &x, n, &Parameters::default());
        assert_eq!(up.added, 0);
        assert_eq!(pool.triangles.len(), m);
    }
}
