//! Concurrent simulation: many runs through one shared strategy stack

use crate::config::SimulationConfig;
use iteration_engine::{StrategyOutput, StrategyStack};
use iteration_types::{
    Completion, DataRef, InvocationContext, IterationResult, Job, OwningProcess,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::Instant;

/// Outcome of a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub runs: usize,
    pub jobs_in: usize,
    pub jobs_out: usize,
    pub completions: usize,
    /// Runs that did not finish with exactly one completion
    pub incomplete_runs: usize,
    pub iteration_depth: usize,
    pub elapsed_ms: u128,
}

impl SimulationReport {
    pub fn is_clean(&self) -> bool {
        self.incomplete_runs == 0
    }
}

#[derive(Debug, Default)]
struct RunTally {
    jobs: usize,
    completions: usize,
    jobs_after_completion: usize,
}

/// Sink counting events per run
#[derive(Debug, Default)]
struct TallyOutput {
    runs: Mutex<HashMap<OwningProcess, RunTally>>,
}

impl StrategyOutput for TallyOutput {
    fn receive_job(&self, job: Job) -> IterationResult<()> {
        let mut runs = self.runs.lock();
        let tally = runs.entry(job.owning_process().clone()).or_default();
        tally.jobs += 1;
        if tally.completions > 0 {
            tally.jobs_after_completion += 1;
        }
        Ok(())
    }

    fn receive_completion(&self, completion: Completion) -> IterationResult<()> {
        let mut runs = self.runs.lock();
        runs.entry(completion.owning_process().clone())
            .or_default()
            .completions += 1;
        Ok(())
    }
}

/// Every index array of `length` positions, each in `0..width`
fn index_space(length: usize, width: usize) -> Vec<Vec<usize>> {
    (0..length).fold(vec![Vec::new()], |acc, _| {
        acc.into_iter()
            .flat_map(|prefix| {
                (0..width).map(move |i| {
                    let mut index = prefix.clone();
                    index.push(i);
                    index
                })
            })
            .collect()
    })
}

/// Supplied depth per port: declared depth plus the configured surplus
pub fn supplied_depths(
    desired: &BTreeMap<String, usize>,
    extra_depth: usize,
) -> HashMap<String, usize> {
    desired
        .iter()
        .map(|(port, depth)| (port.clone(), depth + extra_depth))
        .collect()
}

/// Drive `config.runs` runs through `stack` from `config.threads` threads.
///
/// Each port contributes one job per element of its iterated index space.
/// Within a run, jobs from all ports arrive in shuffled order, followed by
/// one completion per port.
pub fn simulate(stack: &StrategyStack, config: &SimulationConfig) -> anyhow::Result<SimulationReport> {
    let desired = stack.desired_cardinalities();
    let supplied = supplied_depths(&desired, config.extra_depth);
    let iteration_depth = stack.iteration_depth(&supplied)?;

    let mut events: Vec<(String, Vec<usize>)> = Vec::new();
    for (port, depth) in &desired {
        let iterated = supplied[port] - depth;
        for index in index_space(iterated, config.width) {
            events.push((port.clone(), index));
        }
    }
    let jobs_per_run = events.len();
    let ports: Vec<String> = desired.keys().cloned().collect();

    tracing::info!(
        runs = config.runs,
        threads = config.threads,
        jobs_per_run,
        iteration_depth,
        "Starting simulation"
    );

    let output = TallyOutput::default();
    let threads = config.threads.max(1);
    let started = Instant::now();

    thread::scope(|scope| -> anyhow::Result<()> {
        let workers: Vec<_> = (0..threads)
            .map(|worker| {
                let output = &output;
                let events = &events;
                let ports = &ports;
                scope.spawn(move || -> IterationResult<()> {
                    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(worker as u64));
                    for run in (worker..config.runs).step_by(threads) {
                        let owning_process = OwningProcess::new("simulation").push(format!("run{run}"));
                        let context = InvocationContext::new(format!("sim-{run}"));

                        let mut order: Vec<&(String, Vec<usize>)> = events.iter().collect();
                        order.shuffle(&mut rng);
                        for (port, index) in order {
                            let job = Job::single(
                                owning_process.clone(),
                                index.clone(),
                                port.clone(),
                                DataRef::new(format!("{port}{index:?}")),
                                context.clone(),
                            );
                            stack.receive_job(port, job, output)?;
                        }
                        for port in ports {
                            let completion = Completion::whole(owning_process.clone(), context.clone());
                            stack.receive_completion(port, completion, output)?;
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        for worker in workers {
            worker
                .join()
                .map_err(|_| anyhow::anyhow!("simulation worker panicked"))??;
        }
        Ok(())
    })?;

    let elapsed_ms = started.elapsed().as_millis();
    let runs = output.runs.into_inner();
    let report = SimulationReport {
        runs: config.runs,
        jobs_in: jobs_per_run * config.runs,
        jobs_out: runs.values().map(|t| t.jobs).sum(),
        completions: runs.values().map(|t| t.completions).sum(),
        incomplete_runs: config.runs
            - runs
                .values()
                .filter(|t| t.completions == 1 && t.jobs_after_completion == 0)
                .count(),
        iteration_depth,
        elapsed_ms,
    };

    if stack.active_runs() > 0 {
        tracing::warn!(active = stack.active_runs(), "State left behind after simulation");
    }
    tracing::info!(
        jobs_out = report.jobs_out,
        completions = report.completions,
        incomplete = report.incomplete_runs,
        elapsed_ms = report.elapsed_ms,
        "Simulation finished"
    );
    Ok(report)
}
