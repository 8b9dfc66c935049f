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

//! The master side of the search. The master bounds the root node itself
//! (recording the root bound, the first incumbent, and the basic-vs-final
//! gap the workers use to skip hopeless cutting-plane work), then spawns the
//! workers, routes their messages, owns the authoritative incumbent, and
//! decides termination: the job is over when every worker is idle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;

use crate::bounding::{sdp_bound, Engine};
use crate::common::{BabNode, Incumbent};
use crate::error::{Result, SolverError};
use crate::heuristic::{GoemansWilliamson, Heuristic};
use crate::params::Parameters;
use crate::problem::{create_subproblem, Problem};
use crate::solver::message::{MasterMessage, WorkerMessage};
use crate::solver::worker::{Worker, WorkerReport};

/// The outcome of a solve.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Value of the best cut found (the optimum unless a stop flag is set).
    pub value: f64,
    /// Indicator vector of the best cut over the free vertices.
    pub solution: Vec<u8>,
    /// Number of branch-and-bound nodes evaluated, the root included.
    pub nodes: usize,
    /// Wall-clock time of the whole solve.
    pub wall_time: Duration,
    /// The SDP bound computed at the root.
    pub root_bound: f64,
    /// The run was configured to stop after bounding the root.
    pub stopped_at_root: bool,
    /// The time limit drained at least one worker queue.
    pub stopped_by_time: bool,
}

impl Outcome {
    /// Whether the reported value was proved optimal.
    pub fn is_exact(&self) -> bool {
        !self.stopped_at_root && !self.stopped_by_time
    }
}

/// Solves the instance with the default worker count and heuristic.
pub fn solve(sp: &Problem, params: &Parameters) -> Result<Outcome> {
    let workers = num_cpus::get().saturating_sub(1).max(1);
    solve_with(sp, params, workers, Arc::new(GoemansWilliamson))
}

/// Solves the instance with `nb_workers` workers and the given heuristic.
pub fn solve_with(
    sp: &Problem,
    params: &Parameters,
    nb_workers: usize,
    heuristic: Arc<dyn Heuristic>,
) -> Result<Outcome> {
    params.validate()?;
    let start = Instant::now();
    let deadline =
        (params.time_limit > 0).then(|| start + Duration::from_secs(params.time_limit));

    let nfree = sp.nb_free();
    let mut engine = Engine::new(params.clone(), 0).with_heuristic(Arc::clone(&heuristic));
    let mut incumbent = Incumbent::new(nfree);
    let mut root = BabNode::root(nfree);

    // the master evaluates the root itself
    let pp = create_subproblem(&root, sp);
    let root_bound = sdp_bound(&mut engine, &mut root, sp, &pp, &mut incumbent, true)?;
    incumbent.improved = false;
    tracing::info!(root_bound, lower_bound = incumbent.value, "root node bounded");

    let finish = |incumbent: &Incumbent, nodes, at_root, by_time| Outcome {
        value: incumbent.value,
        solution: incumbent.solution.x.clone(),
        nodes,
        wall_time: start.elapsed(),
        root_bound,
        stopped_at_root: at_root,
        stopped_by_time: by_time,
    };

    if params.root {
        return Ok(finish(&incumbent, 1, true, false));
    }
    if root_bound < incumbent.value + 1.0 {
        return Ok(finish(&incumbent, 1, false, false));
    }
    let Some(var) = root.branching_variable(params.branching_strategy) else {
        return Ok(finish(&incumbent, 1, false, false));
    };

    let nb_workers = nb_workers.max(1);
    let (to_master, from_workers) = unbounded::<WorkerMessage>();
    let mut worker_txs = Vec::with_capacity(nb_workers);
    let mut worker_rxs = Vec::with_capacity(nb_workers);
    for _ in 0..nb_workers {
        let (tx, rx) = unbounded::<MasterMessage>();
        worker_txs.push(tx);
        worker_rxs.push(rx);
    }

    // seed the search with the two children of the root
    for (i, child) in [root.child(var, 0, root_bound), root.child(var, 1, root_bound)]
        .into_iter()
        .enumerate()
    {
        let _ = worker_txs[i % nb_workers].send(MasterMessage::Problem(Box::new(child)));
    }

    let diff = engine.diff;
    let result: Result<(Incumbent, usize, bool)> = std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(nb_workers);
        for (id, inbox) in worker_rxs.into_iter().enumerate() {
            let master = to_master.clone();
            let peers = worker_txs.clone();
            let params = params.clone();
            let incumbent = incumbent.clone();
            let heuristic = Arc::clone(&heuristic);
            handles.push(scope.spawn(move || {
                let mut engine =
                    Engine::new(params, id as u64 + 1).with_heuristic(heuristic);
                engine.diff = diff;
                Worker::new(id, sp, engine, incumbent, inbox, master, peers, deadline).run()
            }));
        }
        drop(to_master);

        let mut busy = vec![true; nb_workers];
        let mut stopped = false;
        let mut failure: Option<SolverError> = None;

        // running: route messages until every worker reported idle
        while let Ok(msg) = from_workers.recv() {
            match msg {
                WorkerMessage::Idle { worker, stopped: flag } => {
                    busy[worker] = false;
                    stopped |= flag;
                    if busy.iter().all(|b| !*b) {
                        break;
                    }
                }
                WorkerMessage::NewValue { worker, value, solution } => {
                    if value > incumbent.value {
                        incumbent.value = value;
                        incumbent.solution = solution;
                        tracing::info!(value, worker, "incumbent improved");
                        for tx in &worker_txs {
                            let _ = tx.send(MasterMessage::LowerBound { value });
                            let _ =
                                tx.send(MasterMessage::Solution(incumbent.solution.clone()));
                        }
                    }
                }
                WorkerMessage::SendFreeWorkers { worker, surplus } => {
                    let mut granted = Vec::new();
                    for (rank, flag) in busy.iter_mut().enumerate() {
                        if granted.len() >= surplus {
                            break;
                        }
                        if !*flag && rank != worker {
                            *flag = true;
                            granted.push(rank);
                        }
                    }
                    let _ = worker_txs[worker].send(MasterMessage::FreeWorkers(granted));
                }
                WorkerMessage::Failed { worker, error } => {
                    tracing::error!(worker, %error, "aborting the search");
                    failure = Some(SolverError::Numerical(error));
                    break;
                }
            }
        }

        // draining: shut every worker down and collect their reports
        for tx in &worker_txs {
            let _ = tx.send(MasterMessage::Over);
        }
        let mut evaluated = 0;
        for handle in handles {
            let report = handle.join().unwrap_or(WorkerReport::default());
            evaluated += report.evaluated;
            stopped |= report.stopped;
        }
        // a last improvement may have been posted right before the shutdown
        while let Ok(msg) = from_workers.try_recv() {
            if let WorkerMessage::NewValue { value, solution, .. } = msg {
                if value > incumbent.value {
                    incumbent.value = value;
                    incumbent.solution = solution;
                }
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok((incumbent, evaluated, stopped)),
        }
    });

    let (incumbent, evaluated, stopped) = result?;
    tracing::info!(
        value = incumbent.value,
        nodes = evaluated + 1,
        stopped,
        "search finished"
    );
    Ok(finish(&incumbent, evaluated + 1, false, stopped))
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

/// The solver as a whole is exercised end-to-end in `tests/`, on instances
/// with independently known optima; the unit tests here only cover the plain
/// bookkeeping of the outcome.
#[cfg(test)]
mod test_master {
    use super::*;

    #[test]
    fn an_outcome_without_stop_flags_is_exact() {
        let outcome = Outcome {
            value: 4.0,
            solution: vec![1, 0],
            nodes: 1,
            wall_time: Duration::from_millis(1),
            root_bound: 4.2,
            stopped_at_root: false,
            stopped_by_time: false,
        };
        assert!(outcome.is_exact());
    }

    #[test]
    fn stop_flags_make_the_outcome_inexact() {
        let outcome = Outcome {
            value: 4.0,
            solution: vec![1, 0],
            nodes: 1,
            wall_time: Duration::from_millis(1),
            root_bound: 4.2,
            stopped_at_root: true,
            stopped_by_time: false,
        };
        assert!(!outcome.is_exact());
    }
}
