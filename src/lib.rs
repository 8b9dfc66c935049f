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

//! # Cutbound
//! Cutbound solves the Max-Cut problem to provable optimality on dense
//! weighted graphs, and -- through an exact penalty reduction -- binary
//! quadratic programs with linear equality constraints.
//!
//! The solver is a parallel branch and bound. Every node of the tree is
//! bounded by the basic semidefinite relaxation of Max-Cut, strengthened
//! with triangle, pentagonal and heptagonal inequalities of the cut
//! polytope. The strengthened bound is optimized by a proximal bundle method
//! whose oracle is an interior-point solver for the basic relaxation; the
//! bundle's dual multipliers price the active cutting planes, and a
//! hyperplane-rounding heuristic turns the primal matrices into incumbent
//! cuts along the way. One master coordinates the workers: it owns the
//! global incumbent, balances the load, and detects termination.
//!
//! ## Quick example
//! ```no_run
//! use cutbound::{instance, params::Parameters, solver};
//!
//! # fn main() -> cutbound::error::Result<()> {
//! let problem = instance::read_graph("graph.txt")?;
//! let outcome = solver::solve(&problem, &Parameters::default())?;
//! println!("max-cut = {} ({} nodes)", outcome.value, outcome.nodes);
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod error;
pub mod params;
pub mod linalg;
pub mod problem;
pub mod instance;
pub mod ipm;
pub mod operators;
pub mod separation;
pub mod bundle;
pub mod bounding;
pub mod heuristic;
pub mod solver;

pub use common::{BabNode, BabSolution, Incumbent, NMAX};
pub use error::{Result, SolverError};
pub use params::Parameters;
pub use problem::Problem;
pub use solver::{solve, solve_with, Outcome};
