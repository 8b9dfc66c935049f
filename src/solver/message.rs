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

//! The typed message protocol of the search. Workers talk to the master over
//! one shared channel; the master (and, for node payloads, other workers)
//! talk to each worker over its own channel, so the per-pair delivery order
//! is the send order.
//!
//! Worker lifecycle: `Busy → SentIdle → Receiving → Busy | Shutdown`. The
//! master runs `Running → Draining → Done`: it drains once every worker has
//! reported idle (or a failure surfaced) and then broadcasts [`MasterMessage::Over`].

use crate::common::{BabNode, BabSolution};

/// What a worker can tell the master.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// The worker's queue is empty (or was drained by the time limit) and it
    /// is blocked waiting for work.
    Idle { worker: usize, stopped: bool },
    /// The worker found an improved incumbent.
    NewValue { worker: usize, value: f64, solution: BabSolution },
    /// The worker holds `surplus` offloadable nodes and asks for the ranks of
    /// idle workers to ship them to.
    SendFreeWorkers { worker: usize, surplus: usize },
    /// A fatal error occurred; the whole job must come down.
    Failed { worker: usize, error: String },
}

/// What a worker can receive. `Problem` also travels worker-to-worker when
/// the master granted a load-balancing request.
#[derive(Debug, Clone)]
pub enum MasterMessage {
    /// A subproblem to push onto the local queue.
    Problem(Box<BabNode>),
    /// A new global lower bound; its solution vector follows.
    LowerBound { value: f64 },
    /// The solution achieving the last announced lower bound.
    Solution(BabSolution),
    /// Reply to [`WorkerMessage::SendFreeWorkers`]: the granted ranks. The
    /// requester must ship exactly one node to each of them.
    FreeWorkers(Vec<usize>),
    /// Shut down.
    Over,
}
