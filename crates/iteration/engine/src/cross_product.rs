//! Cross product: every combination of the children's elements
//!
//! Each child's jobs are kept per owning process. A new job on input `i` is
//! combined only against the other children's accumulated history, with the
//! new job standing in as a singleton for its own child. Every combination
//! is therefore produced exactly once, by whichever of its constituent jobs
//! arrived last.

use iteration_types::{Job, OwningProcess};
use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct CrossProduct {
    arity: usize,
    runs: HashMap<OwningProcess, Vec<Vec<Job>>>,
}

impl CrossProduct {
    pub(crate) fn new(arity: usize) -> Self {
        Self {
            arity,
            runs: HashMap::new(),
        }
    }

    /// Store a job and return the combinations it completes
    pub(crate) fn receive_job(&mut self, input: usize, job: Job) -> Vec<Job> {
        let arity = self.arity;
        let seen = self
            .runs
            .entry(job.owning_process().clone())
            .or_insert_with(|| vec![Vec::new(); arity]);
        seen[input].push(job.clone());

        let singleton = std::slice::from_ref(&job);
        let mut working: Vec<Job> = if input == 0 {
            vec![job.clone()]
        } else {
            seen[0].clone()
        };
        for (k, cached) in seen.iter().enumerate().skip(1) {
            if working.is_empty() {
                break;
            }
            let right = if k == input {
                singleton
            } else {
                cached.as_slice()
            };
            working = merge(&working, right, &job);
        }
        working
    }

    pub(crate) fn cleanup(&mut self, owning_process: &OwningProcess) {
        self.runs.remove(owning_process);
    }

    pub(crate) fn has_run(&self, owning_process: &OwningProcess) -> bool {
        self.runs.contains_key(owning_process)
    }

    pub(crate) fn runs(&self) -> impl Iterator<Item = &OwningProcess> {
        self.runs.keys()
    }
}

/// Every pairing of `left` and `right`, indices concatenated in child order
fn merge(left: &[Job], right: &[Job], trigger: &Job) -> Vec<Job> {
    let mut merged = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            let mut index = Vec::with_capacity(l.index().len() + r.index().len());
            index.extend_from_slice(l.index());
            index.extend_from_slice(r.index());
            merged.push(l.merge(r, index, trigger.context().clone()));
        }
    }
    merged
}
