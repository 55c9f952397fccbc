//! Output sinks: where a strategy's terminal node delivers merged events

use iteration_types::{Completion, IterationEvent, IterationResult, Job};
use parking_lot::Mutex;

/// Receiver of a strategy's merged jobs and completions
///
/// Implementations are called from whichever thread delivered the event
/// that completed a combination, possibly several at once.
pub trait StrategyOutput: Send + Sync {
    fn receive_job(&self, job: Job) -> IterationResult<()>;

    fn receive_completion(&self, completion: Completion) -> IterationResult<()>;
}

/// Sink that records every event in arrival order
#[derive(Debug, Default)]
pub struct CollectingOutput {
    events: Mutex<Vec<IterationEvent>>,
}

impl CollectingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far
    pub fn events(&self) -> Vec<IterationEvent> {
        self.events.lock().clone()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.as_job().cloned())
            .collect()
    }

    pub fn completions(&self) -> Vec<Completion> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                IterationEvent::Completion(c) => Some(c.clone()),
                IterationEvent::Job(_) => None,
            })
            .collect()
    }

    /// Drain recorded events
    pub fn take(&self) -> Vec<IterationEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl StrategyOutput for CollectingOutput {
    fn receive_job(&self, job: Job) -> IterationResult<()> {
        self.events.lock().push(IterationEvent::Job(job));
        Ok(())
    }

    fn receive_completion(&self, completion: Completion) -> IterationResult<()> {
        self.events.lock().push(IterationEvent::Completion(completion));
        Ok(())
    }
}
