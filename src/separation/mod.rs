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

//! This module hosts the separation routines that grow and shrink the active
//! set of cutting planes between bundle rounds. All three separators follow
//! the same protocol: prune the cuts whose dual multiplier collapsed, find
//! new violated inequalities on the current primal matrix, merge the most
//! violated ones into the active set with a zero multiplier.

pub mod annealing;
mod triangle;
mod pentagonal;
mod heptagonal;

pub use triangle::update_triangle_inequalities;
pub use pentagonal::update_pentagonal_inequalities;
pub use heptagonal::update_heptagonal_inequalities;

/// What a separation pass reports back to the bounding driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeparationUpdate {
    /// Largest violation observed among the candidates of this pass.
    pub max_violation: f64,
    /// Number of cuts merged into the active set.
    pub added: usize,
    /// Number of cuts pruned from the active set.
    pub removed: usize,
}
