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

//! Command line driver of the solver.

use std::process::exit;
use std::sync::Arc;

use clap::Parser;

use cutbound::heuristic::GoemansWilliamson;
use cutbound::instance;
use cutbound::params::Parameters;
use cutbound::solver;

/// Exact Max-Cut solver (and BQP solver through the Max-Cut reduction).
#[derive(Debug, Parser)]
#[command(name = "cutbound", author, version)]
struct Args {
    /// Path to the instance file.
    instance: String,
    /// Path to a JSON parameter file (all fields optional).
    #[arg(short, long)]
    params: Option<String>,
    /// Interpret the instance as a linearly constrained BQP.
    #[arg(long)]
    bqp: bool,
    /// Number of worker threads (defaults to the available parallelism).
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("error: {error}");
        exit(1);
    }
}

fn run(args: &Args) -> cutbound::Result<()> {
    let params = match &args.params {
        Some(path) => Parameters::from_file(path)?,
        None => Parameters::default(),
    };
    let workers = args
        .workers
        .unwrap_or_else(|| num_cpus::get().saturating_sub(1).max(1));

    if args.bqp {
        let data = instance::read_bqp(&args.instance)?;
        let reduction = instance::reduce_bqp(&data)?;
        let outcome = solver::solve_with(
            &reduction.problem,
            &params,
            workers,
            Arc::new(GoemansWilliamson),
        )?;
        let (x, objective) = reduction.recover(&outcome.solution, outcome.value);

        println!("instance            : {}", args.instance);
        println!("max-cut value       : {}", outcome.value);
        println!("bqp optimum         : {objective}");
        println!("assignment          : {:?}", x);
        report_search(&outcome);
    } else {
        let problem = instance::read_graph(&args.instance)?;
        let outcome = solver::solve_with(&problem, &params, workers, Arc::new(GoemansWilliamson))?;

        println!("instance            : {}", args.instance);
        println!("max-cut value       : {}", outcome.value);
        let side: Vec<usize> = outcome
            .solution
            .iter()
            .enumerate()
            .filter_map(|(i, x)| (*x == 1).then_some(i + 1))
            .collect();
        println!("cut side            : {side:?}");
        report_search(&outcome);
    }
    Ok(())
}

fn report_search(outcome: &solver::Outcome) {
    println!("root bound          : {}", outcome.root_bound);
    println!("nodes evaluated     : {}", outcome.nodes);
    println!("wall time           : {:.3}s", outcome.wall_time.as_secs_f64());
    if outcome.stopped_at_root {
        println!("status              : stopped at root");
    } else if outcome.stopped_by_time {
        println!("status              : stopped by time limit");
    } else {
        println!("status              : optimal");
    }
}
