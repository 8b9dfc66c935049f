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

//! The worker side of the search: owns a local priority queue, evaluates
//! nodes, branches, reports incumbent improvements, and offloads surplus
//! nodes to idle peers granted by the master. Messages are handled between
//! node evaluations only, so a bound update observed mid-evaluation takes
//! effect at the next pruning check.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::bounding::{sdp_bound, Engine};
use crate::common::{BabNode, Incumbent};
use crate::error::Result;
use crate::problem::{create_subproblem, cut_value, Problem};
use crate::solver::message::{MasterMessage, WorkerMessage};
use crate::solver::queue::NodeQueue;

/// What a worker reports when its thread winds down.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WorkerReport {
    /// Number of nodes this worker evaluated.
    pub evaluated: usize,
    /// Whether this worker drained its queue because of the time limit.
    pub stopped: bool,
}

/// Control-flow outcome of handling one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    GotWork,
    Shutdown,
}

pub(crate) struct Worker<'a> {
    pub id: usize,
    pub sp: &'a Problem,
    pub engine: Engine,
    pub queue: NodeQueue,
    pub incumbent: Incumbent,
    pub inbox: Receiver<MasterMessage>,
    pub master: Sender<WorkerMessage>,
    pub peers: Vec<Sender<MasterMessage>>,
    pub deadline: Option<Instant>,
    evaluated: usize,
    stopped: bool,
    /// A `LowerBound` whose `Solution` payload has not arrived yet.
    pending_bound: Option<f64>,
}

impl<'a> Worker<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        sp: &'a Problem,
        engine: Engine,
        incumbent: Incumbent,
        inbox: Receiver<MasterMessage>,
        master: Sender<WorkerMessage>,
        peers: Vec<Sender<MasterMessage>>,
        deadline: Option<Instant>,
    ) -> Self {
        Worker {
            id,
            sp,
            engine,
            queue: NodeQueue::new(),
            incumbent,
            inbox,
            master,
            peers,
            deadline,
            evaluated: 0,
            stopped: false,
            pending_bound: None,
        }
    }

    /// Runs the worker until shutdown. A fatal error is reported to the
    /// master rather than returned: the thread itself always winds down
    /// normally.
    pub fn run(mut self) -> WorkerReport {
        if let Err(error) = self.search() {
            tracing::error!(worker = self.id, %error, "worker failed");
            let _ = self
                .master
                .send(WorkerMessage::Failed { worker: self.id, error: error.to_string() });
        }
        WorkerReport { evaluated: self.evaluated, stopped: self.stopped }
    }

    fn search(&mut self) -> Result<()> {
        loop {
            // handle whatever arrived while the previous node was evaluated
            while let Ok(msg) = self.inbox.try_recv() {
                if self.apply(msg) == Flow::Shutdown {
                    return Ok(());
                }
            }

            // cooperative time limit: drain the queue and report stopped
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline && !self.queue.is_empty() {
                    tracing::warn!(worker = self.id, "time limit hit, draining the queue");
                    self.queue.clear();
                    self.stopped = true;
                }
            }

            let Some(node) = self.queue.pop() else {
                let _ = self
                    .master
                    .send(WorkerMessage::Idle { worker: self.id, stopped: self.stopped });
                loop {
                    match self.inbox.recv() {
                        Ok(msg) => match self.apply(msg) {
                            Flow::Shutdown => return Ok(()),
                            Flow::GotWork => break,
                            Flow::Continue => {}
                        },
                        // the master is gone: nothing left to do
                        Err(_) => return Ok(()),
                    }
                }
                continue;
            };

            // the bound inherited from the parent may already be conclusive
            if node.upper_bound < self.incumbent.value + 1.0 {
                continue;
            }

            self.evaluate(node)?;

            if self.incumbent.improved {
                self.incumbent.improved = false;
                let _ = self.master.send(WorkerMessage::NewValue {
                    worker: self.id,
                    value: self.incumbent.value,
                    solution: self.incumbent.solution.clone(),
                });
            }

            if self.offload()? == Flow::Shutdown {
                return Ok(());
            }
        }
    }

    /// Bounds one node and pushes its children when it cannot be pruned.
    fn evaluate(&mut self, mut node: BabNode) -> Result<()> {
        self.evaluated += 1;

        if node.free_count() == 0 {
            let value = cut_value(self.sp, &node.sol.x);
            self.incumbent.offer(value, &node.sol.x);
            return Ok(());
        }

        let pp = create_subproblem(&node, self.sp);
        let bound = sdp_bound(
            &mut self.engine,
            &mut node,
            self.sp,
            &pp,
            &mut self.incumbent,
            false,
        )?;

        if bound >= self.incumbent.value + 1.0 {
            if let Some(var) = node.branching_variable(self.engine.params.branching_strategy) {
                self.queue.push(node.child(var, 0, bound));
                self.queue.push(node.child(var, 1, bound));
            }
        }
        Ok(())
    }

    /// Ships surplus nodes to idle peers. Blocks until the master's grant
    /// arrives, handling interleaved messages meanwhile.
    fn offload(&mut self) -> Result<Flow> {
        if self.queue.len() <= 1 {
            return Ok(Flow::Continue);
        }
        let surplus = self.queue.len() - 1;
        let _ = self
            .master
            .send(WorkerMessage::SendFreeWorkers { worker: self.id, surplus });

        loop {
            match self.inbox.recv() {
                Ok(MasterMessage::FreeWorkers(ranks)) => {
                    for rank in ranks {
                        // the grant never exceeds the announced surplus
                        if let Some(node) = self.queue.pop() {
                            let _ = self.peers[rank].send(MasterMessage::Problem(Box::new(node)));
                        }
                    }
                    return Ok(Flow::Continue);
                }
                Ok(msg) => {
                    if self.apply(msg) == Flow::Shutdown {
                        return Ok(Flow::Shutdown);
                    }
                }
                Err(_) => return Ok(Flow::Shutdown),
            }
        }
    }

    /// Applies one control message.
    fn apply(&mut self, msg: MasterMessage) -> Flow {
        match msg {
            MasterMessage::Problem(node) => {
                self.queue.push(*node);
                Flow::GotWork
            }
            MasterMessage::LowerBound { value } => {
                self.pending_bound = Some(value);
                Flow::Continue
            }
            MasterMessage::Solution(solution) => {
                if let Some(value) = self.pending_bound.take() {
                    self.incumbent.absorb(value, &solution);
                }
                Flow::Continue
            }
            // a stale grant (only reachable if a request raced shutdown)
            MasterMessage::FreeWorkers(_) => Flow::Continue,
            MasterMessage::Over => Flow::Shutdown,
        }
    }
}
