//! Jobs and completions: the addressed events flowing through the engine

use crate::{DataRef, InvocationContext, OwningProcess, ScopeId};
use std::collections::BTreeMap;

/// Position of an element in an implicit iteration space, outermost first
pub type IndexArray = Vec<usize>;

/// Port name to data reference
pub type DataMap = BTreeMap<String, DataRef>;

// ── Job ──────────────────────────────────────────────────────────────

/// A (possibly partial) per-element unit of data en route to an invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    owning_process: OwningProcess,
    index: IndexArray,
    data: DataMap,
    context: InvocationContext,
}

impl Job {
    pub fn new(
        owning_process: OwningProcess,
        index: IndexArray,
        data: DataMap,
        context: InvocationContext,
    ) -> Self {
        Self {
            owning_process,
            index,
            data,
            context,
        }
    }

    /// A job carrying a single port's data
    pub fn single(
        owning_process: OwningProcess,
        index: IndexArray,
        port: impl Into<String>,
        data: DataRef,
        context: InvocationContext,
    ) -> Self {
        let mut map = DataMap::new();
        map.insert(port.into(), data);
        Self::new(owning_process, index, map, context)
    }

    pub fn owning_process(&self) -> &OwningProcess {
        &self.owning_process
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn data(&self) -> &DataMap {
        &self.data
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    /// Data reference bound to a port
    pub fn get(&self, port: &str) -> Option<&DataRef> {
        self.data.get(port)
    }

    /// True when the index is empty: the job is the whole input for its run
    pub fn is_whole(&self) -> bool {
        self.index.is_empty()
    }

    /// Same job with a different index
    pub fn with_index(&self, index: IndexArray) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    /// Same job with its data restricted to one port
    pub fn restrict_to(&self, port: &str) -> Option<Self> {
        let data = self.data.get(port)?;
        let mut map = DataMap::new();
        map.insert(port.to_string(), data.clone());
        Some(Self {
            data: map,
            ..self.clone()
        })
    }

    /// Prepend an outer position to the index
    pub fn push_index(&self, position: usize) -> Self {
        self.with_index(push_front(&self.index, position))
    }

    /// Remove the outermost position from the index
    pub fn pop_index(&self) -> Option<(usize, Self)> {
        let (first, rest) = self.index.split_first()?;
        Some((*first, self.with_index(rest.to_vec())))
    }

    /// Enter a nested scope
    pub fn push_owning_process(&self, id: impl Into<String>) -> Self {
        Self {
            owning_process: self.owning_process.push(id),
            ..self.clone()
        }
    }

    /// Leave the innermost scope
    pub fn pop_owning_process(&self) -> Option<(ScopeId, Self)> {
        let (id, outer) = self.owning_process.pop()?;
        Some((
            id,
            Self {
                owning_process: outer,
                ..self.clone()
            },
        ))
    }

    /// Union of two jobs' data under a new index, in the same scope.
    ///
    /// Entries of `other` win on port collisions.
    pub fn merge(&self, other: &Job, index: IndexArray, context: InvocationContext) -> Self {
        let mut data = self.data.clone();
        data.extend(other.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            owning_process: self.owning_process.clone(),
            index,
            data,
            context,
        }
    }
}

// ── Completion ───────────────────────────────────────────────────────

/// Signal that no further jobs arrive under an index prefix on an input
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    owning_process: OwningProcess,
    index: IndexArray,
    context: InvocationContext,
}

impl Completion {
    pub fn new(owning_process: OwningProcess, index: IndexArray, context: InvocationContext) -> Self {
        Self {
            owning_process,
            index,
            context,
        }
    }

    /// The input is entirely done for this run
    pub fn whole(owning_process: OwningProcess, context: InvocationContext) -> Self {
        Self::new(owning_process, Vec::new(), context)
    }

    pub fn owning_process(&self) -> &OwningProcess {
        &self.owning_process
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    pub fn is_whole(&self) -> bool {
        self.index.is_empty()
    }

    pub fn push_index(&self, position: usize) -> Self {
        Self {
            index: push_front(&self.index, position),
            ..self.clone()
        }
    }

    pub fn pop_index(&self) -> Option<(usize, Self)> {
        let (first, rest) = self.index.split_first()?;
        Some((
            *first,
            Self {
                index: rest.to_vec(),
                ..self.clone()
            },
        ))
    }

    pub fn push_owning_process(&self, id: impl Into<String>) -> Self {
        Self {
            owning_process: self.owning_process.push(id),
            ..self.clone()
        }
    }

    pub fn pop_owning_process(&self) -> Option<(ScopeId, Self)> {
        let (id, outer) = self.owning_process.pop()?;
        Some((
            id,
            Self {
                owning_process: outer,
                ..self.clone()
            },
        ))
    }
}

// ── Event ────────────────────────────────────────────────────────────

/// Either kind of event, for sinks that record both in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IterationEvent {
    Job(Job),
    Completion(Completion),
}

impl IterationEvent {
    pub fn owning_process(&self) -> &OwningProcess {
        match self {
            Self::Job(job) => job.owning_process(),
            Self::Completion(completion) => completion.owning_process(),
        }
    }

    pub fn index(&self) -> &[usize] {
        match self {
            Self::Job(job) => job.index(),
            Self::Completion(completion) => completion.index(),
        }
    }

    pub fn as_job(&self) -> Option<&Job> {
        match self {
            Self::Job(job) => Some(job),
            Self::Completion(_) => None,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion(_))
    }
}

fn push_front(index: &[usize], position: usize) -> IndexArray {
    let mut pushed = Vec::with_capacity(index.len() + 1);
    pushed.push(position);
    pushed.extend_from_slice(index);
    pushed
}
