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

//! This module is the external-collaborator layer of the solver: it reads
//! graph and BQP instance files and turns them into the objective matrix the
//! core works on.
//!
//! * A **graph** file has a `V E` header followed by `E` lines `i j w` with
//!   1-based endpoints. The objective is the Laplacian of the graph with the
//!   last vertex conventionally fixed to side 0 (Max-Cut is invariant under
//!   swapping the two sides, so this loses nothing).
//! * A **BQP** file describes `max xᵀFx + cᵀx  s.t.  Ax = b, x ∈ {0,1}ⁿ` with
//!   integer data, in sections `A`, `b`, `F`, `c`. The reduction penalizes the
//!   equality constraints with the exact penalty `p = ⌈2ρ + 1⌉`, where `ρ` is
//!   obtained from two oracle calls on the homogenized objective, and emits
//!   the Max-Cut instance over `n + 1` vertices whose optimum recovers the
//!   BQP optimum.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::common::NMAX;
use crate::error::{Result, SolverError};
use crate::ipm;
use crate::problem::Problem;

// ----------------------------------------------------------------------------
// --- GRAPH INPUT ------------------------------------------------------------
// ----------------------------------------------------------------------------

/// Reads a weighted graph file and builds the master objective.
pub fn read_graph<P: AsRef<Path>>(path: P) -> Result<Problem> {
    let file = std::fs::File::open(path)?;
    read_graph_from(BufReader::new(file))
}

/// Same as [`read_graph`] for any reader (handy in tests).
pub fn read_graph_from<R: Read>(input: BufReader<R>) -> Result<Problem> {
    let mut lines = input.lines().enumerate();

    let (nv, ne) = loop {
        let (no, line) = lines
            .next()
            .ok_or_else(|| SolverError::Input("empty graph file".to_string()))?;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        let mut it = line.split_whitespace();
        let nv: usize = parse_field(it.next(), no, "vertex count")?;
        let ne: usize = parse_field(it.next(), no, "edge count")?;
        break (nv, ne);
    };

    if nv < 2 {
        return Err(SolverError::Input(format!("graph needs at least 2 vertices, got {nv}")));
    }
    if nv > NMAX {
        return Err(SolverError::Input(format!("graph has {nv} vertices, the cap is {NMAX}")));
    }

    let mut adj = vec![0.0; nv * nv];
    let mut read_edges = 0usize;
    for (no, line) in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        let mut it = line.split_whitespace();
        let i: usize = parse_field(it.next(), no, "edge endpoint")?;
        let j: usize = parse_field(it.next(), no, "edge endpoint")?;
        let w: f64 = parse_field(it.next(), no, "edge weight")?;
        if i < 1 || i > nv || j < 1 || j > nv || i == j {
            return Err(SolverError::Input(format!(
                "line {}: edge ({i}, {j}) out of range for {nv} vertices",
                no + 1
            )));
        }
        adj[(i - 1) + (j - 1) * nv] = w;
        adj[(j - 1) + (i - 1) * nv] = w;
        read_edges += 1;
    }
    if read_edges != ne {
        return Err(SolverError::Input(format!(
            "header announced {ne} edges but the file holds {read_edges}"
        )));
    }

    problem_from_adjacency(&adj, nv)
}

fn parse_field<T: std::str::FromStr>(tok: Option<&str>, line_no: usize, what: &str) -> Result<T> {
    tok.ok_or_else(|| SolverError::Input(format!("line {}: missing {what}", line_no + 1)))?
        .parse::<T>()
        .map_err(|_| SolverError::Input(format!("line {}: malformed {what}", line_no + 1)))
}

/// Builds the padded Laplacian-form objective from an adjacency matrix of
/// order `nv`. The upper-left block of order `nv − 1` is the Laplacian
/// restricted to the free vertices, the last row/column carries the couplings
/// with the fixed vertex, and the corner their total.
pub fn problem_from_adjacency(adj: &[f64], nv: usize) -> Result<Problem> {
    if nv < 2 || nv > NMAX {
        return Err(SolverError::Input(format!("instance order {nv} not in 2..={NMAX}")));
    }
    let deg: Vec<f64> = (0..nv)
        .map(|i| (0..nv).map(|j| adj[i + j * nv]).sum())
        .collect();

    let mut l = vec![0.0; nv * nv];
    let mut total = 0.0;
    for i in 0..nv - 1 {
        let mut row = 0.0;
        for j in 0..nv - 1 {
            let v = if i == j {
                deg[i] - adj[i + j * nv]
            } else {
                -adj[i + j * nv]
            };
            l[i + j * nv] = v;
            row += v;
        }
        l[i + (nv - 1) * nv] = row;
        l[(nv - 1) + i * nv] = row;
        total += row;
    }
    l[(nv - 1) + (nv - 1) * nv] = total;

    Ok(Problem { l, n: nv })
}

// ----------------------------------------------------------------------------
// --- BQP INPUT --------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The raw data of a linearly constrained binary quadratic program:
/// `max xᵀFx + cᵀx  s.t.  Ax = b, x ∈ {0, 1}ⁿ`.
#[derive(Debug, Clone)]
pub struct BqpData {
    /// Number of binary variables.
    pub n: usize,
    /// Number of equality constraints.
    pub m: usize,
    /// Symmetric objective matrix, column-major `n × n`.
    pub f: Vec<f64>,
    /// Linear objective vector.
    pub c: Vec<f64>,
    /// Constraint matrix, column-major `m × n` (entry `(r, v)` at `r + v*m`).
    pub a: Vec<f64>,
    /// Constraint right-hand side.
    pub b: Vec<f64>,
}

/// A BQP instance reduced to Max-Cut, together with everything needed to map
/// the cut optimum back to the original program.
#[derive(Debug, Clone)]
pub struct BqpReduction {
    /// The Max-Cut objective over `n + 1` vertices.
    pub problem: Problem,
    /// Additive constant restored when reporting: `opt = maxcut − const_val`.
    pub const_val: f64,
    /// The spectral bound used to derive the penalty.
    pub rho: f64,
    /// The exact penalty parameter `⌈2ρ + 1⌉`.
    pub penalty: f64,
}

/// Reads a BQP instance file (sections `A`, `b`, `F`, `c`, integer entries).
pub fn read_bqp<P: AsRef<Path>>(path: P) -> Result<BqpData> {
    let file = std::fs::File::open(path)?;
    read_bqp_from(BufReader::new(file))
}

/// Same as [`read_bqp`] for any reader (handy in tests).
pub fn read_bqp_from<R: Read>(input: BufReader<R>) -> Result<BqpData> {
    let mut lines = input.lines().enumerate().filter_map(|(no, l)| match l {
        Ok(s) => {
            let t = s.trim().to_string();
            if t.is_empty() {
                None
            } else {
                Some(Ok((no, t)))
            }
        }
        Err(e) => Some(Err(e)),
    });

    let (no, header) = lines
        .next()
        .ok_or_else(|| SolverError::Input("empty BQP file".to_string()))??;
    let mut it = header.split_whitespace();
    let n: usize = parse_field(it.next(), no, "variable count")?;
    let m: usize = parse_field(it.next(), no, "constraint count")?;
    if n == 0 || n + 1 > NMAX {
        return Err(SolverError::Input(format!("variable count {n} not in 1..{NMAX}")));
    }

    let (sec_no, section) = lines
        .next()
        .ok_or_else(|| SolverError::Input("missing section 'A'".to_string()))??;
    if section != "A" {
        return Err(SolverError::Input(format!("line {}: expected section 'A'", sec_no + 1)));
    }

    let mut a = vec![0.0; m * n];
    let mut b = vec![0.0; m];
    let mut f = vec![0.0; n * n];
    let mut c = vec![0.0; n];

    // A: triplets until 'b'
    let mut current = 'A';
    for item in lines {
        let (no, line) = item?;
        match line.as_str() {
            "b" if current == 'A' => {
                current = 'b';
                continue;
            }
            "F" if current == 'b' => {
                current = 'F';
                continue;
            }
            "c" if current == 'F' => {
                current = 'c';
                continue;
            }
            _ => {}
        }
        let mut it = line.split_whitespace();
        match current {
            'A' => {
                let i: usize = parse_field(it.next(), no, "constraint row")?;
                let j: usize = parse_field(it.next(), no, "variable column")?;
                let v: f64 = parse_integer(it.next(), no)?;
                check_range(i, m, no, "constraint row")?;
                check_range(j, n, no, "variable column")?;
                a[(i - 1) + (j - 1) * m] = v;
            }
            'b' => {
                let i: usize = parse_field(it.next(), no, "constraint row")?;
                let v: f64 = parse_integer(it.next(), no)?;
                check_range(i, m, no, "constraint row")?;
                b[i - 1] = v;
            }
            'F' => {
                let i: usize = parse_field(it.next(), no, "row index")?;
                let j: usize = parse_field(it.next(), no, "column index")?;
                let v: f64 = parse_integer(it.next(), no)?;
                check_range(i, n, no, "row index")?;
                check_range(j, n, no, "column index")?;
                f[(i - 1) + (j - 1) * n] = v;
                f[(j - 1) + (i - 1) * n] = v;
            }
            _ => {
                let i: usize = parse_field(it.next(), no, "variable index")?;
                let v: f64 = parse_integer(it.next(), no)?;
                check_range(i, n, no, "variable index")?;
                c[i - 1] = v;
            }
        }
    }
    if current != 'c' {
        return Err(SolverError::Input("BQP file ended before section 'c'".to_string()));
    }

    Ok(BqpData { n, m, f, c, a, b })
}

fn parse_integer(tok: Option<&str>, line_no: usize) -> Result<f64> {
    let v: f64 = parse_field(tok, line_no, "value")?;
    if v != v.trunc() {
        return Err(SolverError::Input(format!(
            "line {}: constraint and objective data must be integer, got {v}",
            line_no + 1
        )));
    }
    Ok(v)
}

fn check_range(i: usize, max: usize, line_no: usize, what: &str) -> Result<()> {
    if i < 1 || i > max {
        return Err(SolverError::Input(format!(
            "line {}: {what} {i} out of range 1..={max}",
            line_no + 1
        )));
    }
    Ok(())
}

/// Reduces a BQP to a Max-Cut instance.
///
/// Internally the maximization is turned into a minimization (objective
/// negated), mapped to `{−1, 1}` variables, and the equality constraints are
/// folded into the objective with the exact penalty. The resulting quadratic
/// form is homogenized over `n + 1` vertices and scaled by 4 so that the
/// derived graph has integer weights.
pub fn reduce_bqp(data: &BqpData) -> Result<BqpReduction> {
    let n = data.n;
    let m = data.m;

    // minimize -(x'Fx + c'x)
    let f0: Vec<f64> = data.f.iter().map(|v| -v).collect();
    let c0: Vec<f64> = data.c.iter().map(|v| -v).collect();

    // constant of the {0,1} -> {-1,1} substitution: 1/4 e'Fe + 1/2 c'e
    let mut constant = 0.0;
    for v in &f0 {
        constant += 0.25 * v;
    }
    for v in &c0 {
        constant += 0.5 * v;
    }

    // b' = b - 1/2 Ae ; A' = 1/2 A ; c~ = 1/2 (Fe + c) ; F~ = 1/4 F
    let mut bt = data.b.clone();
    for r in 0..m {
        for v in 0..n {
            bt[r] -= 0.5 * data.a[r + v * m];
        }
    }
    let at: Vec<f64> = data.a.iter().map(|v| 0.5 * v).collect();
    let mut ct = vec![0.0; n];
    for i in 0..n {
        let mut row = c0[i];
        for j in 0..n {
            row += f0[i + j * n];
        }
        ct[i] = 0.5 * row;
    }
    let ft: Vec<f64> = f0.iter().map(|v| 0.25 * v).collect();

    // rho from the extreme relaxation values of the homogenized objective
    let np = n + 1;
    let mut cmat = vec![0.0; np * np];
    for j in 0..n {
        for i in 0..n {
            cmat[i + j * np] = ft[i + j * n];
        }
    }
    for i in 0..n {
        cmat[i + n * np] = 0.5 * ct[i];
        cmat[n + i * np] = 0.5 * ct[i];
    }
    cmat[n + n * np] = constant;

    let r1 = ipm::solve(&cmat, np)?.phi;
    let neg: Vec<f64> = cmat.iter().map(|v| -v).collect();
    let r2 = -ipm::solve(&neg, np)?.phi;
    let rho = r1.abs().max(r2.abs());
    let penalty = (2.0 * rho + 1.0).ceil();
    tracing::info!(rho, penalty, "exact penalty derived for the BQP reduction");

    // penalized quadratic form M = [F~ + p A'ᵀA', c~/2 − p A'ᵀb' ;
    //                               (c~/2 − p A'ᵀb')ᵀ, const + p b'ᵀb']
    let mut mpen = vec![0.0; np * np];
    for j in 0..n {
        for i in 0..n {
            let mut v = ft[i + j * n];
            for r in 0..m {
                v += penalty * at[r + i * m] * at[r + j * m];
            }
            mpen[i + j * np] = v;
        }
    }
    for i in 0..n {
        let mut v = 0.5 * ct[i];
        for r in 0..m {
            v -= penalty * at[r + i * m] * bt[r];
        }
        mpen[i + n * np] = v;
        mpen[n + i * np] = v;
    }
    let btb: f64 = bt.iter().map(|v| v * v).sum();
    mpen[n + n * np] = constant + penalty * btb;

    let const_val: f64 = mpen.iter().sum();

    // derived graph: Adj = 4 (M − diag M); then the padded Laplacian form
    let mut adj = vec![0.0; np * np];
    for j in 0..np {
        for i in 0..np {
            if i != j {
                adj[i + j * np] = 4.0 * mpen[i + j * np];
            }
        }
    }
    let problem = problem_from_adjacency(&adj, np)?;

    Ok(BqpReduction { problem, const_val, rho, penalty })
}

impl BqpReduction {
    /// Maps the optimal cut back to the original program: the assignment and
    /// the objective value `maxcut − const_val`.
    pub fn recover(&self, cut: &[u8], maxcut: f64) -> (Vec<u8>, f64) {
        let x: Vec<u8> = cut.iter().map(|c| 1 - *c).collect();
        (x, maxcut - self.const_val)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_instance {
    use super::*;
    use crate::problem::cut_value;
    use std::io::BufReader;

    #[test]
    fn reads_a_triangle() {
        let text = "3 3\n1 2 1\n1 3 1\n2 3 1\n";
        let sp = read_graph_from(BufReader::new(text.as_bytes())).unwrap();
        assert_eq!(sp.n, 3);
        assert_eq!(cut_value(&sp, &[1, 0]), 2.0);
    }

    #[test]
    fn rejects_wrong_edge_count() {
        let text = "3 2\n1 2 1\n";
        assert!(read_graph_from(BufReader::new(text.as_bytes())).is_err());
    }

    #[test]
    fn rejects_out_of_range_edges() {
        let text = "3 1\n1 4 1\n";
        assert!(read_graph_from(BufReader::new(text.as_bytes())).is_err());
    }

    #[test]
    fn padded_objective_rows_sum_consistently() {
        // the full vector of ones must be in the kernel of the padded form
        let text = "4 3\n1 2 2\n2 3 -1\n3 4 5\n";
        let sp = read_graph_from(BufReader::new(text.as_bytes())).unwrap();
        assert_eq!(cut_value(&sp, &[0, 0, 0]), 0.0);
    }

    #[test]
    fn reads_a_bqp_file() {
        let text = "3 1\nA\n1 1 1\n1 2 1\n1 3 1\nb\n1 2\nF\n1 1 1\n2 2 2\n3 3 3\nc\n1 -1\n2 -1\n3 -1\n";
        let data = read_bqp_from(BufReader::new(text.as_bytes())).unwrap();
        assert_eq!(data.n, 3);
        assert_eq!(data.m, 1);
        assert_eq!(data.f[0], 1.0);
        assert_eq!(data.f[4], 2.0);
        assert_eq!(data.f[8], 3.0);
        assert_eq!(data.b[0], 2.0);
        assert_eq!(data.c, vec![-1.0, -1.0, -1.0]);
    }

    #[test]
    fn rejects_non_integer_bqp_data() {
        let text = "1 1\nA\n1 1 0.5\nb\nF\nc\n";
        assert!(read_bqp_from(BufReader::new(text.as_bytes())).is_err());
    }

    #[test]
    fn bqp_reduction_scores_feasible_points_through_the_cut() {
        // max x'Fx + c'x, F = diag(1,2,3), c = -e, x1+x2+x3 = 2
        let data = BqpData {
            n: 3,
            m: 1,
            f: vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0],
            c: vec![-1.0, -1.0, -1.0],
            a: vec![1.0, 1.0, 1.0],
            b: vec![2.0],
        };
        let red = reduce_bqp(&data).unwrap();
        // the cut encoding x = 1 - cut: feasible x = (0,1,1) <-> cut (1,0,0)
        let value = cut_value(&red.problem, &[1, 0, 0]);
        let (x, obj) = red.recover(&[1, 0, 0], value);
        assert_eq!(x, vec![0, 1, 1]);
        assert!((obj - 3.0).abs() < 1e-6);
        // another feasible point scores its own objective
        let value = cut_value(&red.problem, &[0, 0, 1]);
        let (x, obj) = red.recover(&[0, 0, 1], value);
        assert_eq!(x, vec![1, 1, 0]);
        assert!((obj - 1.0).abs() < 1e-6);
        // an infeasible point is pushed below every feasible one
        let value = cut_value(&red.problem, &[0, 0, 0]);
        let (_, obj) = red.recover(&[0, 0, 0], value);
        assert!(obj < 1.0 - 0.5);
    }
}
