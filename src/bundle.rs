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

//! This module implements the proximal bundle method that maximizes the dual
//! of the cut-strengthened relaxation over the multipliers `γ ≥ 0`. Each
//! iteration solves a small quadratic program over the convex hull of the
//! bundle (a Mehrotra-style interior-point method on its KKT system),
//! evaluates the oracle at the trial point, and classifies the move as a
//! serious or a null step.

use crate::bounding::Engine;
use crate::common::MAX_BUNDLE;
use crate::error::{Result, SolverError};
use crate::ipm;
use crate::linalg;
use crate::operators::{op_b, op_bt, CutPool};
use crate::problem::Problem;

/// Threshold of the predicted-vs-actual decrease test for a serious step.
const SERIOUS_STEP: f64 = 0.05;
/// Bundle elements whose convex weight falls below this fraction of the
/// largest weight are purged.
const PURGE_FRACTION: f64 = 0.01;

/// One element of the bundle: a primal matrix, its objective value, and the
/// subgradient of the dual function it witnesses.
#[derive(Debug, Clone)]
pub struct BundleItem {
    /// Primal matrix `Xᵢ`, column-major of the subproblem order.
    pub x: Vec<f64>,
    /// `<L, Xᵢ>`.
    pub fval: f64,
    /// Subgradient `1 − B(Xᵢ)`, one entry per active cut.
    pub g: Vec<f64>,
}

/// Evaluates the dual function at `gamma`: solves the basic relaxation of
/// `L − Bᵀ(γ)` and returns the value `f`, the primal matrix, and the
/// subgradient `1 − B(X)`.
pub fn fct_eval(
    pp: &Problem,
    cuts: &CutPool,
    gamma: &[f64],
) -> Result<(f64, Vec<f64>, Vec<f64>)> {
    let n = pp.n;
    let m = cuts.len();

    let mut l0 = pp.l.clone();
    if m > 0 {
        op_bt(cuts, &mut l0, n, gamma);
    }

    let sol = ipm::solve(&l0, n)?;
    let mut f = sol.phi;
    let mut g = vec![1.0; m];
    if m > 0 {
        f += gamma.iter().sum::<f64>();
        op_b(cuts, &mut g, &sol.x, n);
    }
    Ok((f, sol.x, g))
}

impl Engine {
    /// Runs `bdl_iter` iterations of the bundle method on the current
    /// subproblem, updating the multipliers, the cached dual value `f`, the
    /// aggregate primal `X` and the proximal parameter `t`.
    pub fn bundle_method(&mut self, pp: &Problem, t: &mut f64, bdl_iter: usize) -> Result<()> {
        let n = pp.n;
        let nn = n * n;

        for _ in 0..bdl_iter {
            let k = self.bundle.len();

            // zeta = -F - Gᵀγ
            let zeta: Vec<f64> = self
                .bundle
                .iter()
                .map(|it| -it.fval - linalg::dot(&it.g, &self.gamma))
                .collect();

            let (lambda, dgamma) = lambda_eta(&self.bundle, &self.gamma, &zeta, t)?;

            let gamma_test: Vec<f64> =
                self.gamma.iter().zip(dgamma.iter()).map(|(g, d)| g + d).collect();

            let (f_test, x_test, g_test) = fct_eval(pp, &self.cuts, &gamma_test)?;

            // predicted decrease: f - (Fᵀλ + γ_testᵀ G λ)
            let approx: f64 = self
                .bundle
                .iter()
                .zip(lambda.iter())
                .map(|(it, l)| l * (it.fval + linalg::dot(&it.g, &gamma_test)))
                .sum();
            let del = self.f - approx;

            let lmax = lambda.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            let fval_test = linalg::frob_inner(&pp.l, &x_test, n);

            if self.f - f_test > SERIOUS_STEP * del {
                // serious step: move to the trial point
                self.gamma = gamma_test;
                self.f = f_test;

                // aggregate primal X = Σ λᵢ Xᵢ
                self.x.clear();
                self.x.resize(nn, 0.0);
                for (it, l) in self.bundle.iter().zip(lambda.iter()) {
                    for idx in 0..nn {
                        self.x[idx] += l * it.x[idx];
                    }
                }

                *t *= 1.01;

                // purge the whole bundle
                let mut it = lambda.iter();
                self.bundle.retain(|_| *it.next().unwrap() >= PURGE_FRACTION * lmax);

                if self.bundle.len() >= MAX_BUNDLE {
                    return Err(SolverError::Capacity("bundle overflow".to_string()));
                }
                self.bundle.push(BundleItem { x: x_test, fval: fval_test, g: g_test });
            } else {
                // null step: stay, but enrich the model
                *t /= 1.01;

                // purge the first k-1 elements, preserve the k-th
                let last = self
                    .bundle
                    .pop()
                    .ok_or_else(|| SolverError::Numerical("empty bundle".to_string()))?;
                let mut it = lambda.iter().take(k - 1);
                self.bundle.retain(|_| *it.next().unwrap() >= PURGE_FRACTION * lmax);

                if self.bundle.len() + 1 >= MAX_BUNDLE {
                    return Err(SolverError::Capacity("bundle overflow".to_string()));
                }
                self.bundle.push(BundleItem { x: x_test, fval: fval_test, g: g_test });
                self.bundle.push(last);
            }
        }

        Ok(())
    }
}

/// Solves the direction-finding problem of one bundle iteration: alternates
/// the simplex QP in `λ` with the closed-form update of the sign multipliers
/// `η`, until the step direction stabilizes. On hitting the iteration cap the
/// proximal parameter is also shrunk.
fn lambda_eta(
    bundle: &[BundleItem],
    gamma: &[f64],
    zeta: &[f64],
    t: &mut f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let k = bundle.len();
    let m = gamma.len();

    // Q = t GᵀG
    let mut q = vec![0.0; k * k];
    for a in 0..k {
        for b in a..k {
            let v = *t * linalg::dot(&bundle[a].g, &bundle[b].g);
            q[a + b * k] = v;
            q[b + a * k] = v;
        }
    }

    let mut eta = vec![0.0; m];
    let mut dgamma = vec![0.0; m];
    let mut tmp = vec![0.0; m];
    let mut dir_prev = 0.0;
    let mut cnt = 0;

    loop {
        cnt += 1;

        // c = zeta - t Gᵀη
        let c: Vec<f64> = (0..k)
            .map(|a| zeta[a] - *t * linalg::dot(&bundle[a].g, &eta))
            .collect();

        let lambda = solve_lambda(&q, &c, k)?;

        // tmp = G λ
        tmp.fill(0.0);
        for (it, l) in bundle.iter().zip(lambda.iter()) {
            for r in 0..m {
                tmp[r] += l * it.g[r];
            }
        }

        // η = max(0, -γ/t + Gλ) and dγ = t (η - Gλ)
        for r in 0..m {
            let e = (-gamma[r] / *t + tmp[r]).max(0.0);
            eta[r] = e;
            dgamma[r] = *t * (e - tmp[r]);
        }

        let dir_curr = linalg::norm2(&dgamma);
        if (dir_curr - dir_prev).abs() / (1.0 + dir_curr) < 1e-5 {
            return Ok((lambda, dgamma));
        }
        if cnt >= 50 {
            *t *= 0.95;
            return Ok((lambda, dgamma));
        }
        dir_prev = dir_curr;
    }
}

/// Solves `min ⟨λ,c⟩ + ½ λᵀQλ  s.t.  Σλ = 1, λ ≥ 0` by a Mehrotra-style
/// predictor step on the symmetric indefinite KKT system.
fn solve_lambda(q: &[f64], c: &[f64], k: usize) -> Result<Vec<f64>> {
    if k == 1 {
        return Ok(vec![1.0]);
    }

    let mut lambda = vec![1.0 / k as f64; k];
    let mut qlam = vec![0.0; k];
    linalg::symv(q, k, &lambda, &mut qlam);

    // starting dual triplet
    let tmp: Vec<f64> = (0..k).map(|a| qlam[a] + c[a]).collect();
    let mintmp = tmp.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut y;
    let mut z: Vec<f64>;
    if mintmp > 1.0 {
        y = 0.0;
        z = tmp;
    } else {
        y = mintmp - 1.0;
        z = tmp.iter().map(|v| v - y).collect();
    }

    let mut mu = 0.5 * linalg::dot(&z, &lambda) / k as f64;
    let mut res_p = 1.0 - lambda.iter().sum::<f64>();
    let mut temp = linalg::dot(&lambda, &qlam);
    let mut gap = (linalg::dot(&lambda, c) + 0.5 * temp) - (y - 0.5 * temp);

    let size = k + 1;
    let mut cnt = 0;

    while gap.abs() > 1e-5 {
        cnt += 1;

        // M = [-Q - Diag(z/λ), e; eᵀ, 0]
        let mut mmat = vec![0.0; size * size];
        for b in 0..k {
            for a in 0..k {
                mmat[a + b * size] = -q[a + b * k];
            }
            mmat[b + b * size] -= z[b] / lambda[b];
            mmat[b + k * size] = 1.0;
            mmat[k + b * size] = 1.0;
        }

        let mut rhs = vec![0.0; size];
        for a in 0..k {
            rhs[a] = c[a] - y + qlam[a];
        }
        rhs[k] = res_p;

        let dw = linalg::solve(&mmat, size, &rhs)?;
        let dy = dw[k];
        let dlambda = &dw[..k];

        // corrector for z
        let dz: Vec<f64> = (0..k)
            .map(|a| (mu - lambda[a] * z[a] - z[a] * dlambda[a]) / lambda[a])
            .collect();

        // step lengths keeping λ and z positive
        let mut alpha_p = f64::NEG_INFINITY;
        let mut alpha_d = f64::NEG_INFINITY;
        for a in 0..k {
            alpha_p = alpha_p.max(-dlambda[a] / lambda[a]);
            alpha_d = alpha_d.max(-dz[a] / z[a]);
        }
        let alpha_p = if alpha_p > 0.0 { (0.99 / alpha_p).min(1.0) } else { 1.0 };
        let alpha_d = if alpha_d > 0.0 { (0.99 / alpha_d).min(1.0) } else { 1.0 };

        y += alpha_d * dy;
        for a in 0..k {
            lambda[a] += alpha_p * dlambda[a];
            z[a] += alpha_d * dz[a];
        }

        res_p = 1.0 - lambda.iter().sum::<f64>();
        linalg::symv(q, k, &lambda, &mut qlam);

        mu = 0.4 * linalg::dot(&lambda, &z) / k as f64;
        if alpha_p + alpha_d > 1.8 {
            mu *= 0.2;
        }

        temp = linalg::dot(&lambda, &qlam);
        gap = (linalg::dot(&lambda, c) + 0.5 * temp) - (y - 0.5 * temp);

        if cnt > 30 {
            break;
        }
    }

    Ok(lambda)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_bundle {
    use super::*;

    #[test]
    fn simplex_qp_puts_all_weight_on_the_cheap_coordinate() {
        // min 10 λ₂ + λ'λ on the simplex -> λ = (1, 0)
        let q = vec![2.0, 0.0, 0.0, 2.0];
        let c = vec![0.0, 10.0];
        let lambda = solve_lambda(&q, &c, 2).unwrap();
        assert!((lambda[0] - 1.0).abs() < 1e-3);
        assert!(lambda[1].abs() < 1e-3);
        assert!((lambda.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn simplex_qp_balances_symmetric_costs() {
        // symmetric problem -> uniform weights
        let q = vec![2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0];
        let c = vec![1.0, 1.0, 1.0];
        let lambda = solve_lambda(&q, &c, 3).unwrap();
        for l in &lambda {
            assert!((l - 1.0 / 3.0).abs() < 1e-4);
        }
    }

    #[test]
    fn qp_solution_is_feasible() {
        let q = vec![4.0, 1.0, 1.0, 3.0];
        let c = vec![-2.0, 0.5];
        let lambda = solve_lambda(&q, &c, 2).unwrap();
        assert!((lambda.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(lambda.iter().all(|l| *l >= -1e-9));
    }

    #[test]
    fn bundle_iterations_never_increase_the_dual_value() {
        use crate::bounding::Engine;
        use crate::operators::TriangleInequality;
        use crate::params::Parameters;

        // quarter-scaled K3 objective; its relaxation optimum is 1.75 and the
        // triangle inequality below cuts it down towards 1.5
        let n = 3;
        let l = vec![0.5, -0.25, 0.25, -0.25, 0.5, 0.25, 0.25, 0.25, 0.0];
        let pp = Problem { l, n };

        let mut engine = Engine::new(Parameters::default(), 7);
        engine.cuts.triangles.push(TriangleInequality {
            i: 0,
            j: 1,
            k: 2,
            kind: 2,
            value: 0.0,
            y: 0.0,
        });
        engine.cuts.load_multipliers(&mut engine.gamma);

        let (f0, x0, g0) = fct_eval(&pp, &engine.cuts, &engine.gamma).unwrap();
        let fval = linalg::frob_inner(&pp.l, &x0, n);
        engine.f = f0;
        engine.x = x0.clone();
        engine.bundle.push(BundleItem { x: x0, fval, g: g0 });

        // the cut must actually be violated at the relaxation optimum
        assert!(engine.bundle[0].g[0] < 0.0);

        let before = engine.f;
        let mut t = 0.5;
        engine.bundle_method(&pp, &mut t, 6).unwrap();

        assert!(engine.f <= before + 1e-9);
        assert!(engine.f >= 1.5 - 1e-6);
        assert!(engine.gamma[0] >= 0.0);
        assert!(engine.bundle.len() <= crate::common::MAX_BUNDLE);
    }

    #[test]
    fn fct_eval_without_cuts_is_the_basic_relaxation() {
        // identity objective: relaxation value is the trace bound n
        let n = 3;
        let mut l = vec![0.0; n * n];
        for i in 0..n {
            l[i + i * n] = 1.0;
        }
        let pp = Problem { l, n };
        let cuts = CutPool::default();
        let (f, x, g) = fct_eval(&pp, &cuts, &[]).unwrap();
        assert!((f - 3.0).abs() < 1e-5);
        assert_eq!(x.len(), 9);
        assert!(g.is_empty());
    }
}
