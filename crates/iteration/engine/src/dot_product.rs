//! Dot products: joining two children's index spaces
//!
//! [`DotProduct`] pairs jobs carrying identical index arrays.
//! [`PrefixDotProduct`] pairs each shallow job on input 0 with every deeper
//! job on input 1 whose index starts with it.
//!
//! Both buffer unmatched jobs in a [`TreeCache`] per input and owning
//! process, and drop entries as soon as they can no longer match.

use crate::tree_cache::TreeCache;
use iteration_types::{Job, OwningProcess};
use std::collections::HashMap;

type Caches = [TreeCache; 2];

fn caches_for<'a>(
    runs: &'a mut HashMap<OwningProcess, Caches>,
    owning_process: &OwningProcess,
) -> &'a mut Caches {
    runs.entry(owning_process.clone()).or_default()
}

/// Merge two jobs with child 0's data first
fn merged(left: &Job, right: &Job, index: Vec<usize>, trigger: &Job) -> Job {
    left.merge(right, index, trigger.context().clone())
}

// ── Dot Product ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct DotProduct {
    runs: HashMap<OwningProcess, Caches>,
}

impl DotProduct {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn receive_job(&mut self, input: usize, job: Job) -> Vec<Job> {
        let caches = caches_for(&mut self.runs, job.owning_process());
        let other = 1 - input;

        match caches[other].remove(job.index()) {
            Some(counterpart) => {
                let (left, right) = if input == 0 {
                    (&job, &counterpart)
                } else {
                    (&counterpart, &job)
                };
                vec![merged(left, right, job.index().to_vec(), &job)]
            }
            None => {
                caches[input].insert(job);
                Vec::new()
            }
        }
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

    #[cfg(test)]
    fn buffered(&self, owning_process: &OwningProcess, input: usize) -> usize {
        self.runs
            .get(owning_process)
            .map_or(0, |caches| caches[input].len())
    }
}

// ── Prefix Dot Product ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct PrefixDotProduct {
    runs: HashMap<OwningProcess, Caches>,
}

impl PrefixDotProduct {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn receive_job(&mut self, input: usize, job: Job) -> Vec<Job> {
        let caches = caches_for(&mut self.runs, job.owning_process());

        if input == 0 {
            let prefix = job.index().to_vec();
            let out: Vec<Job> = caches[1]
                .jobs_with_prefix(&prefix)
                .into_iter()
                .map(|deep| merged(&job, deep, deep.index().to_vec(), &job))
                .collect();
            caches[1].cut(&prefix);
            caches[0].insert(job);
            out
        } else {
            let depth = caches[0].index_length();
            let matched = if caches[0].is_empty() || job.index().len() < depth {
                None
            } else {
                caches[0].get(&job.index()[..depth])
            };
            match matched {
                Some(shallow) => vec![merged(shallow, &job, job.index().to_vec(), &job)],
                None => {
                    caches[1].insert(job);
                    Vec::new()
                }
            }
        }
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

    #[cfg(test)]
    fn buffered(&self, owning_process: &OwningProcess, input: usize) -> usize {
        self.runs
            .get(owning_process)
            .map_or(0, |caches| caches[input].len())
    }
}
