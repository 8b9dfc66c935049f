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

//! Separation of heptagonal inequalities. The pass mirrors the pentagonal
//! one with 7-subsets and four sign kinds.

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::seq::index::sample;

use fxhash::FxHashSet;

use crate::common::MAX_HEPTAGON_CUTS;
use crate::operators::{CutPool, HeptagonInequality, GAMMA_PRUNE};
use crate::params::Parameters;
use crate::separation::annealing::refine_assignment;
use crate::separation::SeparationUpdate;

/// Canonical form for duplicate detection (sorted within each sign class).
fn canonical(kind: u8, vertices: &[usize; 7]) -> (u8, [usize; 7]) {
    let negatives = (kind - 1) as usize;
    let mut key = *vertices;
    key[..negatives].sort_unstable();
    key[negatives..].sort_unstable();
    (kind, key)
}

/// One heptagonal separation pass over the primal matrix `x`. The heptagon
/// block of the (old-layout) dual vector starts at `offset`.
pub fn update_heptagonal_inequalities(
    pool: &mut CutPool,
    gamma: &[f64],
    offset: usize,
    x: &[f64],
    n: usize,
    params: &Parameters,
    rng: &mut SmallRng,
) -> SeparationUpdate {
    let before = pool.heptagons.len();
    let mut kept = Vec::with_capacity(before);
    for (idx, cut) in pool.heptagons.iter().enumerate() {
        let y = gamma[offset + idx];
        if y > GAMMA_PRUNE {
            let mut cut = *cut;
            cut.y = y;
            cut.value = cut.violation(x, n);
            kept.push(cut);
        }
    }
    let removed = before - kept.len();
    pool.heptagons = kept;

    if n < 7 {
        return SeparationUpdate { max_violation: 0.0, added: 0, removed };
    }

    let mut candidates: Vec<HeptagonInequality> = Vec::new();
    let mut max_violation: f64 = 0.0;
    for _ in 0..params.hepta_trials {
        let picked = sample(rng, n, 7).into_vec();
        let mut best: Option<HeptagonInequality> = None;
        for kind in 1..=4u8 {
            let mut verts = [0usize; 7];
            verts.copy_from_slice(&picked);
            let violation =
                refine_assignment(x, n, 1.0 / 3.0, (kind - 1) as usize, &mut verts, rng);
            if violation > params.violated_tri_ineq
                && best.map(|b| violation > b.value).unwrap_or(true)
            {
                best = Some(HeptagonInequality { kind, vertices: verts, value: violation, y: 0.0 });
            }
        }
        if let Some(cand) = best {
            max_violation = max_violation.max(cand.value);
            candidates.push(cand);
        }
    }

    candidates.sort_unstable_by(|a, b| {
        b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal)
    });
    candidates.truncate(params.hepta_ineq);

    let mut active: FxHashSet<(u8, [usize; 7])> = pool
        .heptagons
        .iter()
        .map(|c| canonical(c.kind, &c.vertices))
        .collect();

    let mut added = 0;
    for cand in candidates {
        if pool.heptagons.len() >= MAX_HEPTAGON_CUTS {
            break;
        }
        if active.insert(canonical(cand.kind, &cand.vertices)) {
            pool.heptagons.push(cand);
            added += 1;
        }
    }

    SeparationUpdate { max_violation, added, removed }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_heptagonal_separation {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn separates_a_violated_heptagon() {
        // all off-diagonal entries at -0.4: the all-plus kind scores
        // B = -1/3 * 21 * -0.4 = 2.8 on every 7-subset
        let n = 8;
        let mut x = vec![-0.4; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        let mut pool = CutPool::default();
        let mut rng = SmallRng::seed_from_u64(17);
        let up = update_heptagonal_inequalities(
            &mut pool,
            &[],
            0,
            &x,
            n,
            &Parameters::default(),
            &mut rng,
        );
        assert!(up.added > 0);
        assert!((up.max_violation - 1.8).abs() < 1e-9);
        assert!(pool.heptagons.iter().all(|c| c.kind == 1));
    }

    #[test]
    fn too_small_matrices_are_skipped() {
        let n = 5;
        let mut x = vec![0.0; n * n];
        for i in 0..n {
            x[i + i * n] = 1.0;
        }
        let mut pool = CutPool::default();
        let mut rng = SmallRng::seed_from_u64(2);
        let up = update_heptagonal_inequalities(
            &mut pool,
            &[],
            0,
            &x,
            n,
            &Parameters::default(),
            &mut rng,
        );
        assert_eq!(up.added, 0);
        assert_eq!(up.removed, 0);
    }
}
