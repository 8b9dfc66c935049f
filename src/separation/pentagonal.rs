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

//! Separation of pentagonal inequalities by random subset sampling: each
//! sampled 5-subset is scored for the three sign kinds and the assignment of
//! vertices to sign positions is refined by annealing; the best kind wins.

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::seq::index::sample;

use fxhash::FxHashSet;

use crate::common::MAX_PENTAGON_CUTS;
use crate::operators::{CutPool, PentagonInequality, GAMMA_PRUNE};
use crate::params::Parameters;
use crate::separation::annealing::refine_assignment;
use crate::separation::SeparationUpdate;

/// Canonical form of a pentagon for duplicate detection: the vertices on
/// negative positions and the vertices on positive positions, each sorted.
fn canonical(kind: u8, vertices: &[usize; 5]) -> (u8, [usize; 5]) {
    let negatives = (kind - 1) as usize;
    let mut key = *vertices;
    key[..negatives].sort_unstable();
    key[negatives..].sort_unstable();
    (kind, key)
}

/// One pentagonal separation pass over the primal matrix `x`. The pentagon
/// block of the (old-layout) dual vector starts at `offset`.
pub fn update_pentagonal_inequalities(
    pool: &mut CutPool,
    gamma: &[f64],
    offset: usize,
    x: &[f64],
    n: usize,
    params: &Parameters,
    rng: &mut SmallRng,
) -> SeparationUpdate {
    // prune cuts whose multiplier collapsed
    let before = pool.pentagons.len();
    let mut kept = Vec::with_capacity(before);
    for (idx, cut) in pool.pentagons.iter().enumerate() {
        let y = gamma[offset + idx];
        if y > GAMMA_PRUNE {
            let mut cut = *cut;
            cut.y = y;
            cut.value = cut.violation(x, n);
            kept.push(cut);
        }
    }
    let removed = before - kept.len();
    pool.pentagons = kept;

    if n < 5 {
        return SeparationUpdate { max_violation: 0.0, added: 0, removed };
    }

    // sample subsets, anneal the assignment for each kind, keep the best
    let mut candidates: Vec<PentagonInequality> = Vec::new();
    let mut max_violation: f64 = 0.0;
    for _ in 0..params.pent_trials {
        let picked = sample(rng, n, 5).into_vec();
        let mut best: Option<PentagonInequality> = None;
        for kind in 1..=3u8 {
            let mut verts = [0usize; 5];
            verts.copy_from_slice(&picked);
            let violation =
                refine_assignment(x, n, 0.5, (kind - 1) as usize, &mut verts, rng);
            if violation > params.violated_tri_ineq
                && best.map(|b| violation > b.value).unwrap_or(true)
            {
                best = Some(PentagonInequality { kind, vertices: verts, value: violation, y: 0.0 });
            }
        }
        if let Some(cand) = best {
            max_violation = max_violation.max(cand.value);
            candidates.push(cand);
        }
    }

    // merge, most violated first, without duplicates
    candidates.sort_unstable_by(|a, b| {
        b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal)
    });
    candidates.truncate(params.pent_ineq);

    let mut active: FxHashSet<(u8, [usize; 5])> = pool
        .pentagons
        .iter()
        .map(|c| canonical(c.kind, &c.vertices))
        .collect();

    let mut added = 0;
    for cand in candidates {
        if pool.pentagons.len() >= MAX_PENTAGON_CUTS {
            break;
        }
        if active.insert(canonical(cand.kind, &cand.vertices)) {
            pool.pentagons.push(cand);
            added += 1;
        }
    }

    SeparationUpdate { max_violation, added, removed }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_pentagonal_separation {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn canonical_form_ignores_the_order_within_a_sign_class() {
        assert_eq!(canonical(1, &[4, 2, 0, 3, 1]), canonical(1, &[0, 1, 2, 3, 4]));
        assert_eq!(canonical(3, &[1, 0, 4, 3, 2]), canonical(3, &[0, 1, 2, 3, 4]));
        assert_ne!(canonical(2, &[0, 1, 2, 3, 4]), canonical(2, &[1, 0, 2, 3, 4]));
    }

    #[test]
    fn separates_a_violated_pentagon() {
        // all off-diagonal entries at -0.6: the all-plus kind scores
        // B = -1/2 * 10 * -0.6 = 3 on every 5-subset
        let n = 6;
        let mut x = vec![-0.6; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        let mut pool = CutPool::default();
        let mut rng = SmallRng::seed_from_u64(5);
        let up = update_pentagonal_inequalities(
            &mut pool,
            &[],
            0,
            &x,
            n,
            &Parameters::default(),
            &mut rng,
        );
        assert!(up.added > 0);
        assert!((up.max_violation - 2.0).abs() < 1e-9);
        assert!(pool.pentagons.iter().all(|c| c.kind == 1));
    }

    #[test]
    fn satisfied_matrices_yield_no_cut() {
        // the identity satisfies every pentagonal inequality strictly
        let n = 7;
        let mut x = vec![0.0; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        let mut pool = CutPool::default();
        let mut rng = SmallRng::seed_from_u64(9);
        let up = update_pentagonal_inequalities(
            &mut pool,
            &[],
            0,
            &x,
            n,
            &Parameters::default(),
            &mut rng,
        );
        assert_eq!(up.added, 0);
        assert!(pool.pentagons.is_empty());
    }

    #[test]
    fn prune_respects_the_block_offset() {
        let mut pool = CutPool::default();
        pool.pentagons.push(PentagonInequality {
            kind: 1,
            vertices: [0, 1, 2, 3, 4],
            value: 0.0,
            y: 0.9,
        });
        // dual layout: 2 triangle entries before the pentagon block
        let gamma = [0.5, 0.5, 0.0];
        let n = 5;
        let mut x = vec![0.0; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        let mut rng = SmallRng::seed_from_u64(1);
        let up = update_pentagonal_inequalities(
            &mut pool,
            &gamma,
            2,
            &x,
            n,
            &Parameters::default(),
            &mut rng,
        );
        // the pentagon's own multiplier (at offset 2) is zero: pruned
        assert_eq!(up.removed, 1);
        assert!(pool.pentagons.is_empty());
    }
}
