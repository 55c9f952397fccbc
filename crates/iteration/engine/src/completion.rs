//! Completion tracking shared by every combining node
//!
//! For each owning-process scope the tracker remembers which child inputs
//! have finished and whether a genuine completion event has been seen. A
//! zero-length-index job marks its input finished (the input was a single
//! value) but cannot end the run by itself: at least one real completion
//! must arrive before the node reports the run complete.
//!
//! Once a scope fires it leaves a finished marker behind. The marker absorbs
//! late completions and jobs for that scope so nothing fires twice. It is
//! dropped once every input has sent a completion after the scope finished,
//! when the run is forgotten, or when it becomes the oldest of more than
//! [`FINISHED_RETAINED`] markers.

use iteration_types::OwningProcess;
use std::collections::{HashMap, VecDeque};

/// Finished markers kept per node before the oldest is evicted
pub(crate) const FINISHED_RETAINED: usize = 1024;

#[derive(Debug)]
struct RunCompletion {
    inputs_complete: Vec<bool>,
    completion_seen: bool,
}

impl RunCompletion {
    fn new(arity: usize) -> Self {
        Self {
            inputs_complete: vec![false; arity],
            completion_seen: false,
        }
    }

    fn is_finished(&self) -> bool {
        self.completion_seen && self.inputs_complete.iter().all(|done| *done)
    }
}

/// Per-scope completion bookkeeping for one node
#[derive(Debug)]
pub(crate) struct CompletionTracker {
    arity: usize,
    runs: HashMap<OwningProcess, RunCompletion>,
    /// Inputs that have completed again since the scope finished
    finished: HashMap<OwningProcess, Vec<bool>>,
    finished_order: VecDeque<OwningProcess>,
}

impl CompletionTracker {
    pub(crate) fn new(arity: usize) -> Self {
        Self {
            arity,
            runs: HashMap::new(),
            finished: HashMap::new(),
            finished_order: VecDeque::new(),
        }
    }

    /// Record a zero-length-index job on `input`.
    ///
    /// Returns true when the run has just finished; its state is discarded.
    pub(crate) fn observe_whole_job(&mut self, input: usize, owning_process: &OwningProcess) -> bool {
        self.mark(input, owning_process, false)
    }

    /// Record a zero-length-index completion on `input`.
    ///
    /// Returns true when the run has just finished; its state is discarded.
    pub(crate) fn observe_completion(
        &mut self,
        input: usize,
        owning_process: &OwningProcess,
    ) -> bool {
        self.mark(input, owning_process, true)
    }

    /// Whether the scope already fired and still holds its marker
    pub(crate) fn is_finished(&self, owning_process: &OwningProcess) -> bool {
        self.finished.contains_key(owning_process)
    }

    fn mark(&mut self, input: usize, owning_process: &OwningProcess, real: bool) -> bool {
        if let Some(repeated) = self.finished.get_mut(owning_process) {
            if real {
                repeated[input] = true;
                if repeated.iter().all(|done| *done) {
                    self.forget(owning_process);
                }
            }
            return false;
        }

        let arity = self.arity;
        let run = self
            .runs
            .entry(owning_process.clone())
            .or_insert_with(|| RunCompletion::new(arity));
        run.inputs_complete[input] = true;
        run.completion_seen |= real;

        if run.is_finished() {
            self.runs.remove(owning_process);
            self.retire(owning_process);
            true
        } else {
            false
        }
    }

    fn retire(&mut self, owning_process: &OwningProcess) {
        self.finished
            .insert(owning_process.clone(), vec![false; self.arity]);
        self.finished_order.push_back(owning_process.clone());
        while self.finished_order.len() > FINISHED_RETAINED {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }

    /// Drop all bookkeeping for a scope, finished marker included
    pub(crate) fn forget(&mut self, owning_process: &OwningProcess) {
        self.runs.remove(owning_process);
        if self.finished.remove(owning_process).is_some() {
            self.finished_order.retain(|scope| scope != owning_process);
        }
    }

    /// Whether the scope is still in progress; finished markers do not count
    pub(crate) fn has_run(&self, owning_process: &OwningProcess) -> bool {
        self.runs.contains_key(owning_process)
    }

    #[cfg(test)]
    pub(crate) fn run_count(&self) -> usize {
        self.runs.len()
    }

    #[cfg(test)]
    pub(crate) fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub(crate) fn runs(&self) -> impl Iterator<Item = &OwningProcess> {
        self.runs.keys()
    }
}
