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

//! This module defines the most basic data types that are used throughout all
//! the code of the solver: the branch-and-bound node, the incumbent solution
//! vector, and the compile-time capacities.

// ----------------------------------------------------------------------------
// --- CAPACITIES -------------------------------------------------------------
// ----------------------------------------------------------------------------

/// Maximum number of variables an instance may have. The message payloads and
/// the scratch buffers are dimensioned against this cap, so it is checked once
/// at input time and assumed everywhere else.
pub const NMAX: usize = 1024;

/// Maximum number of elements the bundle may hold. Overflowing this capacity
/// indicates a tuning bug and is treated as a fatal error.
pub const MAX_BUNDLE: usize = 400;

/// Maximum number of simultaneously active triangle inequalities.
pub const MAX_TRIANGLE_CUTS: usize = 50_000;
/// Maximum number of simultaneously active pentagonal inequalities.
pub const MAX_PENTAGON_CUTS: usize = 50_000;
/// Maximum number of simultaneously active heptagonal inequalities.
pub const MAX_HEPTAGON_CUTS: usize = 50_000;

/// Branching rule: pick the unfixed variable whose fractional value is the
/// farthest from one half.
pub const LEAST_FRACTIONAL: u8 = 0;
/// Branching rule: pick the unfixed variable whose fractional value is the
/// closest to one half.
pub const MOST_FRACTIONAL: u8 = 1;

// ----------------------------------------------------------------------------
// --- SOLUTION ---------------------------------------------------------------
// ----------------------------------------------------------------------------

/// A (candidate) solution of the branch-and-bound algorithm: an indicator
/// vector over the free vertices of the problem. The vertex that was fixed to
/// side 0 by the input convention is not part of the vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BabSolution {
    /// Binary vector: `x[i] == 1` iff vertex `i` is on the cut side.
    pub x: Vec<u8>,
}

impl BabSolution {
    /// An all-zeros assignment (the empty cut). This is the starting
    /// incumbent: it is always feasible and its cut value is zero.
    pub fn empty(n: usize) -> Self {
        BabSolution { x: vec![0; n] }
    }
}

// ----------------------------------------------------------------------------
// --- NODE -------------------------------------------------------------------
// ----------------------------------------------------------------------------

/// A node of the branch-and-bound tree: a partial assignment of the vertices
/// together with the bookkeeping the search needs to order and branch on it.
///
/// # Note
/// The field order is also the payload order of the `Problem` message that
/// ships a node from one worker to another.
#[derive(Debug, Clone)]
pub struct BabNode {
    /// `xfixed[i]` tells whether vertex `i` has been assigned by branching.
    pub xfixed: Vec<bool>,
    /// The partial integral assignment; meaningful where `xfixed` is set.
    pub sol: BabSolution,
    /// Last-column rounding of the SDP primal, in `[0, 1]`. This is what the
    /// branching rule looks at to pick the next variable.
    pub fracsol: Vec<f64>,
    /// Depth of the node in the tree.
    pub level: usize,
    /// Upper bound inherited from the parent evaluation; priority key in the
    /// node queue.
    pub upper_bound: f64,
}

impl BabNode {
    /// Creates the root node over `n` free vertices: nothing is fixed and the
    /// bound is not known yet.
    pub fn root(n: usize) -> Self {
        BabNode {
            xfixed: vec![false; n],
            sol: BabSolution::empty(n),
            fracsol: vec![0.0; n],
            level: 0,
            upper_bound: f64::INFINITY,
        }
    }

    /// Creates the child of this node which fixes `var` to `value`. The child
    /// inherits the parent's (freshly computed) upper bound as its priority.
    pub fn child(&self, var: usize, value: u8, bound: f64) -> Self {
        let mut child = self.clone();
        child.xfixed[var] = true;
        child.sol.x[var] = value;
        child.level = self.level + 1;
        child.upper_bound = bound;
        child
    }

    /// Number of vertices fixed by branching decisions.
    pub fn fixed_count(&self) -> usize {
        self.xfixed.iter().filter(|f| **f).count()
    }

    /// Number of vertices that are still free.
    pub fn free_count(&self) -> usize {
        self.xfixed.len() - self.fixed_count()
    }

    /// Selects the branching variable among the unfixed indices from the
    /// fractional solution, according to the configured strategy.
    /// Returns `None` when every vertex is fixed.
    pub fn branching_variable(&self, strategy: u8) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, fixed) in self.xfixed.iter().enumerate() {
            if *fixed {
                continue;
            }
            let score = (0.5 - self.fracsol[i]).abs();
            let better = match best {
                None => true,
                Some((_, s)) => {
                    if strategy == LEAST_FRACTIONAL {
                        score > s
                    } else {
                        score < s
                    }
                }
            };
            if better {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }
}

// ----------------------------------------------------------------------------
// --- INCUMBENT --------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The best integral cut known so far. Each worker keeps its own cached copy;
/// the master owns the authoritative one and broadcasts improvements.
#[derive(Debug, Clone)]
pub struct Incumbent {
    /// Value of the best known cut: the global lower bound.
    pub value: f64,
    /// The cut achieving that value.
    pub solution: BabSolution,
    /// Raised when this copy improved locally and the master has not been
    /// told yet; cleared by the owner once the news is sent.
    pub improved: bool,
}

impl Incumbent {
    /// Starts from the empty cut, whose value is zero.
    pub fn new(n: usize) -> Self {
        Incumbent { value: 0.0, solution: BabSolution::empty(n), improved: false }
    }

    /// Records `x` as the new best solution if it improves on the cached
    /// value. Returns true on improvement.
    pub fn offer(&mut self, value: f64, x: &[u8]) -> bool {
        if value > self.value {
            self.value = value;
            self.solution.x.clear();
            self.solution.x.extend_from_slice(x);
            self.improved = true;
            true
        } else {
            false
        }
    }

    /// Applies an update broadcast by the master. Silently ignores updates
    /// that do not beat the cached value.
    pub fn absorb(&mut self, value: f64, solution: &BabSolution) {
        if value > self.value {
            self.value = value;
            self.solution = solution.clone();
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_node {
    use super::*;

    #[test]
    fn root_has_nothing_fixed() {
        let root = BabNode::root(5);
        assert_eq!(root.fixed_count(), 0);
        assert_eq!(root.free_count(), 5);
        assert_eq!(root.level, 0);
    }

    #[test]
    fn child_fixes_one_more_variable() {
        let root = BabNode::root(5);
        let child = root.child(2, 1, 10.0);
        assert_eq!(child.fixed_count(), 1);
        assert!(child.xfixed[2]);
        assert_eq!(child.sol.x[2], 1);
        assert_eq!(child.level, 1);
        assert_eq!(child.upper_bound, 10.0);
    }

    #[test]
    fn most_fractional_picks_the_entry_closest_to_one_half() {
        let mut node = BabNode::root(4);
        node.fracsol = vec![0.9, 0.55, 0.1, 0.2];
        assert_eq!(node.branching_variable(MOST_FRACTIONAL), Some(1));
    }

    #[test]
    fn least_fractional_picks_the_entry_farthest_from_one_half() {
        let mut node = BabNode::root(4);
        node.fracsol = vec![0.9, 0.55, 0.03, 0.2];
        assert_eq!(node.branching_variable(LEAST_FRACTIONAL), Some(2));
    }

    #[test]
    fn fixed_variables_are_never_branched_on() {
        let mut node = BabNode::root(3);
        node.fracsol = vec![0.5, 0.9, 0.9];
        node.xfixed[0] = true;
        assert_ne!(node.branching_variable(MOST_FRACTIONAL), Some(0));
    }

    #[test]
    fn fully_fixed_node_has_no_branching_variable() {
        let mut node = BabNode::root(2);
        node.xfixed = vec![true, true];
        assert_eq!(node.branching_variable(MOST_FRACTIONAL), None);
    }
}
