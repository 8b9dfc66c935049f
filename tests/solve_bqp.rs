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

//! Round-trip certificate for the BQP reduction: reduce, solve the derived
//! Max-Cut instance, recover the original optimum.

use std::sync::Arc;

use cutbound::heuristic::GoemansWilliamson;
use cutbound::instance::{reduce_bqp, BqpData};
use cutbound::params::Parameters;
use cutbound::solver::solve_with;

/// Exhaustive reference over the feasible assignments.
fn brute_force(data: &BqpData) -> (f64, Vec<u8>) {
    let n = data.n;
    let mut best = f64::NEG_INFINITY;
    let mut arg = vec![0u8; n];
    for bits in 0..(1u32 << n) {
        let x: Vec<f64> = (0..n).map(|i| ((bits >> i) & 1) as f64).collect();
        // feasibility: Ax = b
        let feasible = (0..data.m).all(|r| {
            let lhs: f64 = (0..n).map(|v| data.a[r + v * data.m] * x[v]).sum();
            lhs == data.b[r]
        });
        if !feasible {
            continue;
        }
        let mut value = 0.0;
        for i in 0..n {
            for j in 0..n {
                value += x[i] * data.f[i + j * n] * x[j];
            }
            value += data.c[i] * x[i];
        }
        if value > best {
            best = value;
            arg = x.iter().map(|v| *v as u8).collect();
        }
    }
    (best, arg)
}

#[test]
fn minimal_bqp_recovers_the_known_optimum() {
    // max x'Fx + c'x with F = diag(1, 2, 3), c = -e, subject to x1+x2+x3 = 2:
    // optimum 3 at x = (0, 1, 1)
    let data = BqpData {
        n: 3,
        m: 1,
        f: vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0],
        c: vec![-1.0, -1.0, -1.0],
        a: vec![1.0, 1.0, 1.0],
        b: vec![2.0],
    };
    let (reference, arg) = brute_force(&data);
    assert_eq!(reference, 3.0);
    assert_eq!(arg, vec![0, 1, 1]);

    let reduction = reduce_bqp(&data).unwrap();
    let outcome = solve_with(
        &reduction.problem,
        &Parameters::default(),
        1,
        Arc::new(GoemansWilliamson),
    )
    .unwrap();
    assert!(outcome.is_exact());

    let (x, objective) = reduction.recover(&outcome.solution, outcome.value);
    assert!((objective - 3.0).abs() < 1e-6);
    assert_eq!(x, vec![0, 1, 1]);
}

#[test]
fn unconstrained_bqp_reduces_and_solves() {
    // max x'Fx + c'x with no constraint rows at all
    let data = BqpData {
        n: 4,
        m: 0,
        f: vec![
            0.0, 2.0, -1.0, 0.0, //
            2.0, 0.0, 1.0, 0.0, //
            -1.0, 1.0, 0.0, 3.0, //
            0.0, 0.0, 3.0, 0.0,
        ],
        c: vec![1.0, -2.0, 0.0, -1.0],
        a: vec![],
        b: vec![],
    };
    let (reference, _) = brute_force(&data);

    let reduction = reduce_bqp(&data).unwrap();
    let outcome = solve_with(
        &reduction.problem,
        &Parameters::default(),
        1,
        Arc::new(GoemansWilliamson),
    )
    .unwrap();
    assert!(outcome.is_exact());

    let (_, objective) = reduction.recover(&outcome.solution, outcome.value);
    assert!((objective - reference).abs() < 1e-6);
}
