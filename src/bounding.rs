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

//! This module drives the bounding of one branch-and-bound node: repeated
//! rounds of bundle optimization and cutting-plane separation, interleaved
//! with the rounding heuristic and the pruning tests.
//!
//! The [`Engine`] gathers everything a worker owns across node evaluations:
//! the parameters, the RNG, the cut pool, the bundle, the dual multipliers
//! and the aggregate primal matrix. Passing it explicitly (instead of a set
//! of globals) is what keeps the bounding/separation/bundle/oracle knot in
//! one place.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::bundle::{fct_eval, BundleItem};
use crate::common::{BabNode, Incumbent};
use crate::error::Result;
use crate::heuristic::{GoemansWilliamson, Heuristic};
use crate::ipm;
use crate::linalg;
use crate::operators::{op_b, CutPool};
use crate::params::Parameters;
use crate::problem::{fixed_value, Problem};
use crate::separation::{
    update_heptagonal_inequalities, update_pentagonal_inequalities,
    update_triangle_inequalities,
};

/// Triangle violation under which the pentagonal separator is unlocked early.
const PENT_ACTIVATION: f64 = 0.2;

/// The per-worker bounding state, allocated once and reused for every node
/// the worker evaluates.
pub struct Engine {
    pub params: Parameters,
    pub rng: SmallRng,
    /// Active cutting planes of the subproblem under evaluation.
    pub cuts: CutPool,
    /// The bundle of primal matrices, values and subgradients.
    pub bundle: Vec<BundleItem>,
    /// Dual multipliers, one per active cut.
    pub gamma: Vec<f64>,
    /// Aggregate primal matrix of the subproblem under evaluation.
    pub x: Vec<f64>,
    /// Cached dual value of the relaxation.
    pub f: f64,
    /// Gap between the basic relaxation and the cut-strengthened bound at the
    /// root; lets workers skip hopeless cutting-plane work.
    pub diff: f64,
    /// The lower-bound producer.
    pub heuristic: Arc<dyn Heuristic>,
}

impl Engine {
    /// A fresh engine with the built-in rounding heuristic. The seed keeps
    /// every worker's randomized routines on a reproducible stream.
    pub fn new(params: Parameters, seed: u64) -> Self {
        Engine {
            params,
            rng: SmallRng::seed_from_u64(seed),
            cuts: CutPool::default(),
            bundle: Vec::new(),
            gamma: Vec::new(),
            x: Vec::new(),
            f: 0.0,
            diff: 0.0,
            heuristic: Arc::new(GoemansWilliamson),
        }
    }

    /// Replaces the lower-bound producer.
    pub fn with_heuristic(mut self, heuristic: Arc<dyn Heuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Runs the heuristic on the current primal and offers the result to the
    /// incumbent. Returns the heuristic value.
    fn try_heuristic(
        &mut self,
        sp: &Problem,
        pp: &Problem,
        node: &BabNode,
        incumbent: &mut Incumbent,
    ) -> Result<f64> {
        let nfree = sp.nb_free();
        let mut x = vec![0u8; nfree];
        for i in 0..nfree {
            if node.xfixed[i] {
                x[i] = node.sol.x[i];
            }
        }
        let heuristic = Arc::clone(&self.heuristic);
        let value = heuristic.run(sp, pp, node, &self.x, &mut x, &mut self.rng)?;
        incumbent.offer(value, &x);
        Ok(value)
    }

    /// Copies the last-column rounding of the primal into the node, keeping
    /// the integral entries of the fixed vertices.
    fn store_fracsol(&self, node: &mut BabNode, sp: &Problem, pp: &Problem) {
        let pn = pp.n;
        let mut index = 0;
        for i in 0..sp.nb_free() {
            if node.xfixed[i] {
                node.fracsol[i] = node.sol.x[i] as f64;
            } else {
                let raw = 0.5 * (self.x[(pn - 1) + index * pn] + 1.0);
                node.fracsol[i] = raw.clamp(0.0, 1.0);
                index += 1;
            }
        }
    }
}

/// Computes the SDP upper bound of `node` and stores its fractional solution.
/// `at_root` switches on the recording of the root `diff` and switches off
/// the skip-by-diff shortcut.
pub fn sdp_bound(
    engine: &mut Engine,
    node: &mut BabNode,
    sp: &Problem,
    pp: &Problem,
    incumbent: &mut Incumbent,
    at_root: bool,
) -> Result<f64> {
    let n = pp.n;
    let fixed = fixed_value(node, sp);

    // start clean: no cuts, no bundle
    engine.cuts.clear();
    engine.bundle.clear();
    engine.gamma.clear();

    // basic relaxation
    let basic = ipm::solve(&pp.l, n)?;
    engine.f = basic.phi;
    engine.x = basic.x;
    let basic_bound = engine.f + fixed;

    engine.store_fracsol(node, sp, pp);
    engine.try_heuristic(sp, pp, node, incumbent)?;

    let mut bound = engine.f + fixed;
    if bound < incumbent.value + 1.0 {
        // basic bound already prunes the node
        if at_root {
            engine.diff = 0.0;
        }
        return Ok(bound);
    }

    if engine.params.use_diff && !at_root && bound > incumbent.value + engine.diff + 1.0 {
        // the root gap says the cutting planes cannot close this one
        return Ok(bound);
    }

    // first triangle separation seeds the bundle
    let first = update_triangle_inequalities(
        &mut engine.cuts,
        &engine.gamma,
        &engine.x,
        n,
        &engine.params,
    );
    let mut viol3 = first.max_violation;
    if engine.cuts.is_empty() {
        // the relaxation is already polytope-tight at this precision
        if at_root {
            engine.diff = 0.0;
        }
        return Ok(bound);
    }
    engine.cuts.check_capacity()?;
    engine.cuts.load_multipliers(&mut engine.gamma);

    let m = engine.cuts.len();
    let mut t = 0.5 * (bound - incumbent.value) / (m as f64 * viol3 * viol3);
    if !t.is_finite() || t <= 0.0 {
        t = 1.0;
    }

    // bundle starts from the basic-relaxation primal
    let mut g = vec![1.0; m];
    op_b(&engine.cuts, &mut g, &engine.x, n);
    let fval = linalg::frob_inner(&pp.l, &engine.x, n);
    engine.bundle.push(BundleItem { x: engine.x.clone(), fval, g });

    let params = engine.params.clone();
    let mut bdl_iter = params.init_bundle_iter;
    let mut count = 0;
    let mut viol5 = 0.0;

    loop {
        count += 1;
        let oldf = engine.f;

        engine.bundle_method(pp, &mut t, bdl_iter)?;
        bound = engine.f + fixed;

        let mut prune = bound < incumbent.value + 1.0;
        if !prune {
            engine.try_heuristic(sp, pp, node, incumbent)?;
            prune = bound < incumbent.value + 1.0;
        }

        let gap = bound - incumbent.value;
        let mut giveup = false;

        // no hope of pruning within the remaining rounds; the round budget
        // may already be overdrawn, in which case the factor goes negative
        // and the test fires at once
        let rounds_left = params.max_outer_iter as f64 - count as f64;
        if count == params.triag_iter + params.pent_iter + params.hept_iter
            && gap - 1.0 > (oldf - engine.f) * rounds_left
        {
            giveup = true;
        }
        // even the extra rounds would not close the gap
        if count == params.max_outer_iter && gap - 1.0 > (oldf - engine.f) * params.extra_iter as f64
        {
            giveup = true;
        }
        if count == params.max_outer_iter + params.extra_iter {
            giveup = true;
        }

        if !prune && !giveup {
            // the dual vector still has the pre-update layout: remember where
            // the pentagonal and heptagonal blocks start
            let triag = engine.cuts.triangles.len();
            let penta = engine.cuts.pentagons.len();

            let tri = update_triangle_inequalities(
                &mut engine.cuts,
                &engine.gamma,
                &engine.x,
                n,
                &params,
            );
            viol3 = tri.max_violation;

            if params.include_pent && (count > params.triag_iter || viol3 < PENT_ACTIVATION) {
                let pent = update_pentagonal_inequalities(
                    &mut engine.cuts,
                    &engine.gamma,
                    triag,
                    &engine.x,
                    n,
                    &params,
                    &mut engine.rng,
                );
                viol5 = pent.max_violation;
            }

            if params.include_hepta
                && (count > params.triag_iter + params.pent_iter
                    || (viol3 < PENT_ACTIVATION && 1.0 - viol5 < 0.4))
            {
                update_heptagonal_inequalities(
                    &mut engine.cuts,
                    &engine.gamma,
                    triag + penta,
                    &engine.x,
                    n,
                    &params,
                    &mut engine.rng,
                );
            }
            engine.cuts.check_capacity()?;

            tracing::trace!(
                round = count,
                bound,
                triangles = engine.cuts.triangles.len(),
                pentagons = engine.cuts.pentagons.len(),
                heptagons = engine.cuts.heptagons.len(),
                "separation round done"
            );
        }

        let done = prune || giveup;
        engine.store_fracsol(node, sp, pp);

        if done {
            break;
        }

        // refresh the bundle for the new active set
        engine.cuts.load_multipliers(&mut engine.gamma);
        let (_, x_test, g_test) = fct_eval(pp, &engine.cuts, &engine.gamma)?;

        let m = engine.cuts.len();
        for item in engine.bundle.iter_mut() {
            item.g.clear();
            item.g.resize(m, 1.0);
            op_b(&engine.cuts, &mut item.g, &item.x, n);
        }

        if engine.bundle.len() >= crate::common::MAX_BUNDLE {
            return Err(crate::error::SolverError::Capacity("bundle overflow".to_string()));
        }
        let fval = linalg::frob_inner(&pp.l, &x_test, n);
        engine.bundle.push(BundleItem { x: x_test, fval, g: g_test });
        t *= 1.05;

        // grow the bundle budget every other round
        bdl_iter = (bdl_iter + count % 2).min(params.max_bundle_iter);
    }

    bound = engine.f + fixed;
    if at_root {
        engine.diff = basic_bound - bound;
    }
    Ok(bound)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_bounding {
    use super::*;
    use crate::instance::problem_from_adjacency;
    use crate::problem::{create_subproblem, cut_value};

    fn complete_graph(n: usize) -> Problem {
        let mut adj = vec![1.0; n * n];
        for i in 0..n {
            adj[i + i * n] = 0.0;
        }
        problem_from_adjacency(&adj, n).unwrap()
    }

    fn cycle_graph(n: usize) -> Problem {
        let mut adj = vec![0.0; n * n];
        for i in 0..n {
            let j = (i + 1) % n;
            adj[i + j * n] = 1.0;
            adj[j + i * n] = 1.0;
        }
        problem_from_adjacency(&adj, n).unwrap()
    }

    fn bound_root(sp: &Problem) -> (f64, Incumbent) {
        let mut engine = Engine::new(Parameters::default(), 42);
        let mut incumbent = Incumbent::new(sp.nb_free());
        let mut root = BabNode::root(sp.nb_free());
        let pp = create_subproblem(&root, sp);
        let bound = sdp_bound(&mut engine, &mut root, sp, &pp, &mut incumbent, true).unwrap();
        (bound, incumbent)
    }

    #[test]
    fn triangle_root_is_pruned_by_the_basic_bound() {
        let sp = complete_graph(3);
        let (bound, incumbent) = bound_root(&sp);
        assert_eq!(incumbent.value, 2.0);
        // basic relaxation value of K3 is 2.25
        assert!(bound >= 2.0);
        assert!(bound < 3.0);
    }

    #[test]
    fn k4_root_is_pruned_after_one_pass() {
        let sp = complete_graph(4);
        let (bound, incumbent) = bound_root(&sp);
        assert_eq!(incumbent.value, 4.0);
        assert!(bound >= 4.0 - 1e-6);
        assert!(bound < 5.0);
    }

    #[test]
    fn five_cycle_root_is_conclusive() {
        let sp = cycle_graph(5);
        let (bound, incumbent) = bound_root(&sp);
        assert_eq!(incumbent.value, 4.0);
        assert!(bound >= 4.0 - 1e-6);
        assert!(bound < 5.0);
    }

    #[test]
    fn bound_dominates_every_completion() {
        // random-ish weighted graph on 8 vertices
        let n = 8;
        let weights = [
            (0usize, 1usize, 3.0),
            (0, 3, -2.0),
            (1, 2, 4.0),
            (1, 5, 1.0),
            (2, 6, -3.0),
            (3, 4, 5.0),
            (4, 7, 2.0),
            (5, 6, 4.0),
            (6, 7, 1.0),
            (2, 4, 2.0),
        ];
        let mut adj = vec![0.0; n * n];
        for (i, j, w) in weights {
            adj[i + j * n] = w;
            adj[j + i * n] = w;
        }
        let sp = problem_from_adjacency(&adj, n).unwrap();
        let (bound, _) = bound_root(&sp);

        // exhaustive check of the valid-upper-bound property
        let nfree = sp.nb_free();
        let mut best = f64::NEG_INFINITY;
        for bits in 0..(1u32 << nfree) {
            let x: Vec<u8> = (0..nfree).map(|i| ((bits >> i) & 1) as u8).collect();
            best = best.max(cut_value(&sp, &x));
        }
        assert!(bound >= best - 1e-6);
    }

    #[test]
    fn overdrawn_phase_budget_still_yields_a_valid_bound() {
        // the phase budget exceeds max_outer_iter, a combination the
        // parameters accept: once the round count passes max_outer_iter the
        // remaining-rounds factor of the give-up test goes negative and the
        // node gives up instead of burning the extra rounds
        let n = 5;
        let mut adj = vec![0.0; n * n];
        for i in 0..n {
            let j = (i + 1) % n;
            adj[i + j * n] = 4.0;
            adj[j + i * n] = 4.0;
        }
        let sp = problem_from_adjacency(&adj, n).unwrap();

        let mut params = Parameters::default();
        params.triag_iter = 2;
        params.pent_iter = 1;
        params.hept_iter = 1;
        params.max_outer_iter = 3;
        params.extra_iter = 2;
        assert!(params.validate().is_ok());

        // optimum 16, basic relaxation about 18.09: the root is not
        // conclusive and the cutting-plane loop actually runs
        let mut engine = Engine::new(params, 11);
        let mut incumbent = Incumbent::new(sp.nb_free());
        let mut root = BabNode::root(sp.nb_free());
        let pp = create_subproblem(&root, &sp);
        let bound =
            sdp_bound(&mut engine, &mut root, &sp, &pp, &mut incumbent, true).unwrap();
        assert_eq!(incumbent.value, 16.0);
        assert!(bound >= 16.0 - 1e-6);
    }

    #[test]
    fn fracsol_entries_stay_in_the_unit_interval() {
        let sp = cycle_graph(7);
        let mut engine = Engine::new(Parameters::default(), 1);
        let mut incumbent = Incumbent::new(sp.nb_free());
        let root = BabNode::root(sp.nb_free());
        let mut node = root.child(2, 1, f64::INFINITY);
        let pp = create_subproblem(&node, &sp);
        sdp_bound(&mut engine, &mut node, &sp, &pp, &mut incumbent, true).unwrap();
        for (i, frac) in node.fracsol.iter().enumerate() {
            assert!((0.0..=1.0).contains(frac));
            if node.xfixed[i] {
                assert_eq!(*frac, node.sol.x[i] as f64);
            }
        }
    }
}
