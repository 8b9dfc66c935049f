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

//! This module provides the priority queue each worker keeps its open nodes
//! in: a binary max-heap ordered by upper bound, with the depth of the node
//! as a deterministic tie-break (deeper first, which bounds the memory the
//! queue can grow to).

use std::cmp::Ordering;

use binary_heap_plus::BinaryHeap;
use compare::Compare;

use crate::common::BabNode;

/// The comparator of the node queue: the node with the highest upper bound
/// pops first; among equal bounds, the deeper node does.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxBound;
impl Compare<BabNode> for MaxBound {
    fn compare(&self, a: &BabNode, b: &BabNode) -> Ordering {
        a.upper_bound
            .partial_cmp(&b.upper_bound)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.level.cmp(&b.level))
    }
}

/// The worker-local priority queue of open branch-and-bound nodes.
pub struct NodeQueue {
    heap: BinaryHeap<BabNode, MaxBound>,
}

impl Default for NodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeQueue {
    pub fn new() -> Self {
        NodeQueue { heap: BinaryHeap::from_vec_cmp(vec![], MaxBound) }
    }

    pub fn push(&mut self, node: BabNode) {
        self.heap.push(node)
    }

    /// Takes and removes the node with the highest priority.
    pub fn pop(&mut self) -> Option<BabNode> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.len() == 0
    }

    pub fn clear(&mut self) {
        self.heap.clear()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
