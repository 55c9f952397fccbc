//! Strategy: a compiled, shareable iteration strategy tree
//!
//! Compiling a [`StrategyTree`] freezes its topology. Each combining node
//! gets one mutex guarding its per-run state; a node forwards its results to
//! its parent while still holding its own lock, so locks are only ever taken
//! child to parent and no ordering cycle can form. Nothing inside the tree
//! waits for data: every call transforms, forwards and returns.
//!
//! One compiled strategy serves any number of concurrent workflow runs, kept
//! apart by owning-process scope.

use crate::completion::CompletionTracker;
use crate::cross_product::CrossProduct;
use crate::dot_product::{DotProduct, PrefixDotProduct};
use crate::output::StrategyOutput;
use crate::tree::StrategyTree;
use iteration_types::{
    Completion, InvocationContext, IterationError, IterationEvent, IterationResult, Job, NodeId,
    NodeKind, OwningProcess, StrategyDefinition, StructuralError,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

// ── Per-node runtime state ───────────────────────────────────────────

#[derive(Debug)]
enum Combine {
    Cross(CrossProduct),
    Dot(DotProduct),
    PrefixDot(PrefixDotProduct),
}

impl Combine {
    fn receive_job(&mut self, input: usize, job: Job) -> Vec<Job> {
        match self {
            Self::Cross(cross) => cross.receive_job(input, job),
            Self::Dot(dot) => dot.receive_job(input, job),
            Self::PrefixDot(prefix) => prefix.receive_job(input, job),
        }
    }

    fn cleanup(&mut self, owning_process: &OwningProcess) {
        match self {
            Self::Cross(cross) => cross.cleanup(owning_process),
            Self::Dot(dot) => dot.cleanup(owning_process),
            Self::PrefixDot(prefix) => prefix.cleanup(owning_process),
        }
    }

    fn runs(&self) -> Box<dyn Iterator<Item = &OwningProcess> + '_> {
        match self {
            Self::Cross(cross) => Box::new(cross.runs()),
            Self::Dot(dot) => Box::new(dot.runs()),
            Self::PrefixDot(prefix) => Box::new(prefix.runs()),
        }
    }

    fn has_run(&self, owning_process: &OwningProcess) -> bool {
        match self {
            Self::Cross(cross) => cross.has_run(owning_process),
            Self::Dot(dot) => dot.has_run(owning_process),
            Self::PrefixDot(prefix) => prefix.has_run(owning_process),
        }
    }
}

/// Combine state plus completion bookkeeping, guarded together
#[derive(Debug)]
struct NodeState {
    completion: CompletionTracker,
    combine: Combine,
}

impl NodeState {
    fn new(kind: &NodeKind, arity: usize) -> Option<Self> {
        let combine = match kind {
            NodeKind::CrossProduct => Combine::Cross(CrossProduct::new(arity)),
            NodeKind::DotProduct => Combine::Dot(DotProduct::new()),
            NodeKind::PrefixDotProduct => Combine::PrefixDot(PrefixDotProduct::new()),
            NodeKind::NamedInput { .. } | NodeKind::Terminal => return None,
        };
        Some(Self {
            completion: CompletionTracker::new(arity),
            combine,
        })
    }

    fn receive(&mut self, input: usize, event: IterationEvent) -> Vec<IterationEvent> {
        match event {
            IterationEvent::Job(job) => {
                let whole = job.is_whole();
                let owning_process = job.owning_process().clone();
                let context = job.context().clone();
                if self.completion.is_finished(&owning_process) {
                    tracing::trace!(
                        owning_process = %owning_process,
                        "Dropping job for a finished scope"
                    );
                    return Vec::new();
                }

                let mut out: Vec<IterationEvent> = self
                    .combine
                    .receive_job(input, job)
                    .into_iter()
                    .map(IterationEvent::Job)
                    .collect();
                if whole && self.completion.observe_whole_job(input, &owning_process) {
                    out.push(self.finish(owning_process, context));
                }
                out
            }
            IterationEvent::Completion(completion) => {
                // Partial completions carry nothing the combine state needs
                if !completion.is_whole() {
                    return Vec::new();
                }
                let owning_process = completion.owning_process().clone();
                if self.completion.observe_completion(input, &owning_process) {
                    vec![self.finish(owning_process, completion.context().clone())]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn finish(&mut self, owning_process: OwningProcess, context: InvocationContext) -> IterationEvent {
        self.combine.cleanup(&owning_process);
        IterationEvent::Completion(Completion::whole(owning_process, context))
    }

    fn abandon(&mut self, owning_process: &OwningProcess) {
        self.completion.forget(owning_process);
        self.combine.cleanup(owning_process);
    }
}

#[derive(Debug)]
struct RuntimeNode {
    id: NodeId,
    kind: NodeKind,
    parent: Option<usize>,
    position: usize,
    children: Vec<usize>,
    state: Option<Mutex<NodeState>>,
}

impl RuntimeNode {
    /// Number of inputs the node accepts events on
    fn arity(&self) -> usize {
        match self.kind {
            NodeKind::NamedInput { .. } | NodeKind::Terminal => 1,
            _ => self.children.len(),
        }
    }
}

#[derive(Debug)]
struct CompiledStrategy {
    nodes: Vec<RuntimeNode>,
    root: usize,
    ports: Vec<String>,
    inputs: HashMap<String, usize>,
    by_id: HashMap<NodeId, usize>,
}

// ── Strategy ─────────────────────────────────────────────────────────

/// A compiled iteration strategy, cheap to clone and safe to share
#[derive(Clone, Debug)]
pub struct Strategy {
    inner: Arc<CompiledStrategy>,
}

impl Strategy {
    /// Freeze a tree into a runnable strategy rooted at `terminal`.
    ///
    /// Checks everything the build-time API could not: the root must be a
    /// terminal, dot and prefix-dot nodes need exactly two children, a
    /// cross product at least one, and port names must be unique.
    pub fn compile(tree: StrategyTree, terminal: NodeId) -> IterationResult<Self> {
        let root_node = tree.node(terminal)?;
        if root_node.kind != NodeKind::Terminal {
            return Err(StructuralError::RootNotTerminal(terminal).into());
        }

        let mut nodes: Vec<RuntimeNode> = Vec::new();
        let mut by_id = HashMap::new();
        let mut ports = Vec::new();
        let mut inputs = HashMap::new();

        // Depth-first, parents before children, children left to right
        let mut pending: Vec<(NodeId, Option<usize>, usize)> = vec![(terminal, None, 0)];
        while let Some((id, parent, position)) = pending.pop() {
            let source = tree.node(id)?;
            check_arity(id, &source.kind, source.children.len())?;

            let index = nodes.len();
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }
            if let NodeKind::NamedInput { port, .. } = &source.kind {
                if inputs.insert(port.clone(), index).is_some() {
                    return Err(StructuralError::DuplicatePort(port.clone()).into());
                }
                ports.push(port.clone());
            }

            nodes.push(RuntimeNode {
                id,
                kind: source.kind.clone(),
                parent,
                position,
                children: Vec::new(),
                state: NodeState::new(&source.kind, source.children.len()).map(Mutex::new),
            });
            by_id.insert(id, index);

            for (child_position, child) in source.children.iter().enumerate().rev() {
                pending.push((*child, Some(index), child_position));
            }
        }

        tracing::info!(
            nodes = nodes.len(),
            inputs = ports.len(),
            "Iteration strategy compiled"
        );

        Ok(Self {
            inner: Arc::new(CompiledStrategy {
                nodes,
                root: 0,
                ports,
                inputs,
                by_id,
            }),
        })
    }

    /// Build and compile a strategy from its declarative form
    pub fn from_definition(definition: &StrategyDefinition) -> IterationResult<Self> {
        let (tree, terminal) = StrategyTree::from_definition(definition)?;
        Self::compile(tree, terminal)
    }

    /// Input port names, leaves left to right
    pub fn input_ports(&self) -> Vec<&str> {
        self.inner.ports.iter().map(String::as_str).collect()
    }

    /// Declared collection depth each port expects
    pub fn desired_cardinalities(&self) -> BTreeMap<String, usize> {
        self.inner
            .nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::NamedInput {
                    port,
                    desired_cardinality,
                } => Some((port.clone(), *desired_cardinality)),
                _ => None,
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Number of implicit iteration dimensions for the supplied port depths
    pub fn iteration_depth(&self, supplied: &HashMap<String, usize>) -> IterationResult<usize> {
        self.depth_of(self.inner.root, supplied)
    }

    fn depth_of(&self, index: usize, supplied: &HashMap<String, usize>) -> IterationResult<usize> {
        let node = &self.inner.nodes[index];
        match &node.kind {
            NodeKind::NamedInput {
                port,
                desired_cardinality,
            } => {
                let depth = supplied
                    .get(port)
                    .ok_or_else(|| IterationError::MissingIterationInput(port.clone()))?;
                Ok(depth.saturating_sub(*desired_cardinality))
            }
            NodeKind::Terminal => match node.children.first() {
                Some(child) => self.depth_of(*child, supplied),
                None => Ok(0),
            },
            NodeKind::CrossProduct => node
                .children
                .iter()
                .map(|child| self.depth_of(*child, supplied))
                .sum(),
            NodeKind::DotProduct | NodeKind::PrefixDotProduct => {
                let left = self.depth_of(node.children[0], supplied)?;
                let right = self.depth_of(node.children[1], supplied)?;
                let compatible = if node.kind == NodeKind::DotProduct {
                    left == right
                } else {
                    left <= right
                };
                if !compatible {
                    return Err(IterationError::IterationTypeMismatch {
                        node: node.id,
                        left,
                        right,
                    });
                }
                Ok(right)
            }
        }
    }

    // ── Leaf-facing API ──────────────────────────────────────────────

    /// Deliver a job to the named input leaf for `port`
    pub fn receive_job(
        &self,
        port: &str,
        job: Job,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let leaf = self.leaf(port)?;
        self.receive(leaf, 0, IterationEvent::Job(job), output)
    }

    /// Deliver a completion to the named input leaf for `port`
    pub fn receive_completion(
        &self,
        port: &str,
        completion: Completion,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let leaf = self.leaf(port)?;
        self.receive(leaf, 0, IterationEvent::Completion(completion), output)
    }

    /// Deliver a job to any node on one of its child inputs
    pub fn deliver_job(
        &self,
        node: NodeId,
        input: usize,
        job: Job,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let index = self.runtime_index(node)?;
        self.receive(index, input, IterationEvent::Job(job), output)
    }

    /// Deliver a completion to any node on one of its child inputs
    pub fn deliver_completion(
        &self,
        node: NodeId,
        input: usize,
        completion: Completion,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let index = self.runtime_index(node)?;
        self.receive(index, input, IterationEvent::Completion(completion), output)
    }

    /// Complete every input of a run so its state is released.
    ///
    /// Used when a run is cancelled before its inputs finish naturally. The
    /// final completion still reaches `output`.
    pub fn abort_run(
        &self,
        owning_process: &OwningProcess,
        context: &InvocationContext,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        tracing::debug!(owning_process = %owning_process, "Aborting iteration run");
        for port in &self.inner.ports {
            let completion = Completion::whole(owning_process.clone(), context.clone());
            self.receive_completion(port, completion, output)?;
        }
        self.release_run(owning_process);
        Ok(())
    }

    /// Drop every node's state for a run without emitting anything
    pub fn release_run(&self, owning_process: &OwningProcess) {
        for node in &self.inner.nodes {
            if let Some(state) = &node.state {
                state.lock().abandon(owning_process);
            }
        }
    }

    /// Number of distinct runs currently holding state anywhere in the tree
    pub fn active_runs(&self) -> usize {
        let mut runs = HashSet::new();
        for node in &self.inner.nodes {
            if let Some(state) = &node.state {
                let state = state.lock();
                runs.extend(state.completion.runs().cloned());
                runs.extend(state.combine.runs().cloned());
            }
        }
        runs.len()
    }

    /// Whether a run holds state anywhere in the tree
    pub fn is_active(&self, owning_process: &OwningProcess) -> bool {
        self.inner.nodes.iter().any(|node| {
            node.state.as_ref().is_some_and(|state| {
                let state = state.lock();
                state.completion.has_run(owning_process) || state.combine.has_run(owning_process)
            })
        })
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    fn receive(
        &self,
        index: usize,
        input: usize,
        event: IterationEvent,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let node = &self.inner.nodes[index];
        let arity = node.arity();
        if input >= arity {
            return Err(IterationError::InputOutOfRange {
                node: node.id,
                input,
                arity,
            });
        }

        match &node.state {
            None => self.forward(index, event, output),
            Some(state) => {
                let mut state = state.lock();
                for emitted in state.receive(input, event) {
                    if let IterationEvent::Completion(completion) = &emitted {
                        tracing::debug!(
                            node = %node.id,
                            kind = node.kind.label(),
                            owning_process = %completion.owning_process(),
                            "Run complete at node"
                        );
                    }
                    self.push(index, emitted, output)?;
                }
                Ok(())
            }
        }
    }

    /// Pass an event through a node that keeps no state
    fn forward(
        &self,
        index: usize,
        event: IterationEvent,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        if self.inner.nodes[index].kind != NodeKind::Terminal {
            return self.push(index, event, output);
        }
        match event {
            IterationEvent::Job(job) => {
                tracing::trace!(
                    owning_process = %job.owning_process(),
                    index = ?job.index(),
                    "Strategy emitted job"
                );
                output.receive_job(job)
            }
            IterationEvent::Completion(completion) => output.receive_completion(completion),
        }
    }

    /// Send an event to the parent, addressed by this node's position.
    /// Without a parent this is a no-op.
    fn push(
        &self,
        index: usize,
        event: IterationEvent,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let node = &self.inner.nodes[index];
        match node.parent {
            Some(parent) => self.receive(parent, node.position, event, output),
            None => Ok(()),
        }
    }

    fn leaf(&self, port: &str) -> IterationResult<usize> {
        self.inner
            .inputs
            .get(port)
            .copied()
            .ok_or_else(|| IterationError::UnknownInputPort(port.to_string()))
    }

    fn runtime_index(&self, node: NodeId) -> IterationResult<usize> {
        self.inner
            .by_id
            .get(&node)
            .copied()
            .ok_or_else(|| StructuralError::UnknownNode(node).into())
    }
}

fn check_arity(id: NodeId, kind: &NodeKind, found: usize) -> IterationResult<()> {
    let (ok, expected) = match kind {
        NodeKind::CrossProduct => (found >= 1, "at least 1"),
        NodeKind::DotProduct | NodeKind::PrefixDotProduct => (found == 2, "exactly 2"),
        NodeKind::NamedInput { .. } => (found == 0, "no"),
        NodeKind::Terminal => (found <= 1, "at most 1"),
    };
    if ok {
        Ok(())
    } else {
        Err(StructuralError::WrongArity {
            node: id,
            kind: kind.label(),
            expected,
            found,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CollectingOutput;
    use iteration_types::DataRef;
    use std::collections::HashSet;

    fn ctx() -> InvocationContext {
        InvocationContext::new("ctx")
    }

    fn job(run: &OwningProcess, port: &str, index: &[usize]) -> Job {
        Job::single(
            run.clone(),
            index.to_vec(),
            port,
            DataRef::new(format!("{}{:?}", port, index)),
            ctx(),
        )
    }

    fn done(run: &OwningProcess) -> Completion {
        Completion::whole(run.clone(), ctx())
    }

    fn two_inputs(kind: fn(StrategyDefinition, StrategyDefinition) -> StrategyDefinition) -> Strategy {
        Strategy::from_definition(&kind(
            StrategyDefinition::input("a", 0),
            StrategyDefinition::input("b", 0),
        ))
        .unwrap()
    }

    fn cross_ab(a: StrategyDefinition, b: StrategyDefinition) -> StrategyDefinition {
        StrategyDefinition::cross(vec![a, b])
    }

    fn supplied(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(p, d)| (p.to_string(), *d)).collect()
    }

    fn index_set(jobs: &[Job]) -> HashSet<Vec<usize>> {
        jobs.iter().map(|j| j.index().to_vec()).collect()
    }

    #[test]
    fn test_cross_product_order_independent() {
        let run = OwningProcess::new("run");
        let arrivals = [
            ("a", 0usize),
            ("b", 0),
            ("a", 1),
            ("b", 1),
        ];
        // Every rotation of the arrival order yields the same four jobs
        for shift in 0..arrivals.len() {
            let strategy = two_inputs(cross_ab);
            let sink = CollectingOutput::new();
            for k in 0..arrivals.len() {
                let (port, i) = arrivals[(k + shift) % arrivals.len()];
                strategy.receive_job(port, job(&run, port, &[i]), &sink).unwrap();
            }

            let jobs = sink.jobs();
            assert_eq!(jobs.len(), 4);
            assert_eq!(
                index_set(&jobs),
                HashSet::from([vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]])
            );
            for merged in &jobs {
                let index = merged.index();
                assert_eq!(merged.get("a"), Some(&DataRef::new(format!("a{:?}", [index[0]]))));
                assert_eq!(merged.get("b"), Some(&DataRef::new(format!("b{:?}", [index[1]]))));
            }
        }
    }

    #[test]
    fn test_dot_product_immediate_match() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(StrategyDefinition::dot);
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&run, "a", &[0]), &sink).unwrap();
        assert!(sink.is_empty());
        strategy.receive_job("a", job(&run, "a", &[1]), &sink).unwrap();
        strategy.receive_job("b", job(&run, "b", &[1]), &sink).unwrap();
        assert_eq!(sink.jobs().len(), 1);

        strategy.receive_job("b", job(&run, "b", &[0]), &sink).unwrap();
        let jobs = sink.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].index(), &[1]);
        assert_eq!(jobs[1].index(), &[0]);
    }

    #[test]
    fn test_prefix_dot_flush() {
        let run = OwningProcess::new("run");
        let strategy = Strategy::from_definition(&StrategyDefinition::prefix_dot(
            StrategyDefinition::input("a", 0),
            StrategyDefinition::input("b", 0),
        ))
        .unwrap();
        let sink = CollectingOutput::new();

        strategy.receive_job("b", job(&run, "b", &[0, 0]), &sink).unwrap();
        strategy.receive_job("b", job(&run, "b", &[0, 1]), &sink).unwrap();
        assert!(sink.is_empty());

        strategy.receive_job("a", job(&run, "a", &[0]), &sink).unwrap();
        let flushed: Vec<Vec<usize>> = sink.jobs().iter().map(|j| j.index().to_vec()).collect();
        assert_eq!(flushed, vec![vec![0, 0], vec![0, 1]]);

        strategy.receive_job("a", job(&run, "a", &[1]), &sink).unwrap();
        strategy.receive_job("b", job(&run, "b", &[1, 0]), &sink).unwrap();
        strategy.receive_job("b", job(&run, "b", &[1, 1]), &sink).unwrap();
        assert_eq!(sink.jobs().len(), 4);
    }

    #[test]
    fn test_completion_waits_for_both_children() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(cross_ab);
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&run, "a", &[0]), &sink).unwrap();
        strategy.receive_completion("a", done(&run), &sink).unwrap();
        assert!(sink.completions().is_empty());

        strategy.receive_job("b", job(&run, "b", &[0]), &sink).unwrap();
        strategy.receive_completion("b", done(&run), &sink).unwrap();

        let events = sink.events();
        assert_eq!(sink.completions().len(), 1);
        assert!(events.last().unwrap().is_completion());
        assert!(!strategy.is_active(&run));

        // Duplicate completion after purge neither re-emits nor errors
        strategy.receive_completion("b", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);
    }

    #[test]
    fn test_duplicates_on_every_port_fire_once() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(cross_ab);
        let sink = CollectingOutput::new();

        strategy.receive_completion("a", done(&run), &sink).unwrap();
        strategy.receive_completion("b", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);

        strategy.receive_completion("a", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);
        assert!(!strategy.is_active(&run));

        strategy.receive_completion("b", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);
        assert!(!strategy.is_active(&run));
        assert_eq!(strategy.active_runs(), 0);
    }

    #[test]
    fn test_single_child_cross_fires_once() {
        let run = OwningProcess::new("run");
        let strategy = Strategy::from_definition(&StrategyDefinition::cross(vec![
            StrategyDefinition::input("a", 0),
        ]))
        .unwrap();
        let sink = CollectingOutput::new();

        strategy.receive_completion("a", done(&run), &sink).unwrap();
        strategy.receive_completion("a", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);
        assert_eq!(strategy.active_runs(), 0);
    }

    #[test]
    fn test_jobs_after_completion_dropped() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(StrategyDefinition::dot);
        let sink = CollectingOutput::new();

        strategy.receive_completion("a", done(&run), &sink).unwrap();
        strategy.receive_completion("b", done(&run), &sink).unwrap();
        strategy.receive_job("a", job(&run, "a", &[0]), &sink).unwrap();

        assert!(sink.jobs().is_empty());
        assert!(!strategy.is_active(&run));
    }

    #[test]
    fn test_whole_jobs_need_real_completion() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(cross_ab);
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&run, "a", &[]), &sink).unwrap();
        strategy.receive_job("b", job(&run, "b", &[]), &sink).unwrap();
        assert_eq!(sink.jobs().len(), 1);
        assert_eq!(sink.jobs()[0].index(), &[] as &[usize]);
        assert!(sink.completions().is_empty());

        strategy.receive_completion("a", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);

        // The second port's own completion is absorbed and leaves nothing behind
        strategy.receive_completion("b", done(&run), &sink).unwrap();
        assert_eq!(sink.completions().len(), 1);
        assert_eq!(strategy.active_runs(), 0);
    }

    #[test]
    fn test_partial_completions_absorbed_by_combiners() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(cross_ab);
        let sink = CollectingOutput::new();

        let partial = Completion::new(run.clone(), vec![0], ctx());
        strategy.receive_completion("a", partial, &sink).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_single_input_forwards_everything() {
        let run = OwningProcess::new("run");
        let strategy = Strategy::from_definition(&StrategyDefinition::input("a", 0)).unwrap();
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&run, "a", &[2]), &sink).unwrap();
        strategy
            .receive_completion("a", Completion::new(run.clone(), vec![2], ctx()), &sink)
            .unwrap();
        strategy.receive_completion("a", done(&run), &sink).unwrap();
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_runs_kept_apart() {
        let first = OwningProcess::new("run1");
        let second = OwningProcess::new("run2");
        let strategy = two_inputs(StrategyDefinition::dot);
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&first, "a", &[0]), &sink).unwrap();
        strategy.receive_job("b", job(&second, "b", &[0]), &sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(strategy.active_runs(), 2);

        strategy.receive_job("b", job(&first, "b", &[0]), &sink).unwrap();
        assert_eq!(sink.jobs()[0].owning_process(), &first);
    }

    #[test]
    fn test_nested_tree_completion_propagates() {
        let run = OwningProcess::new("run");
        let strategy = Strategy::from_definition(&StrategyDefinition::cross(vec![
            StrategyDefinition::dot(
                StrategyDefinition::input("a", 0),
                StrategyDefinition::input("b", 0),
            ),
            StrategyDefinition::input("c", 0),
        ]))
        .unwrap();
        let sink = CollectingOutput::new();

        for i in 0..2 {
            strategy.receive_job("a", job(&run, "a", &[i]), &sink).unwrap();
            strategy.receive_job("b", job(&run, "b", &[i]), &sink).unwrap();
        }
        strategy.receive_job("c", job(&run, "c", &[5]), &sink).unwrap();
        for port in ["a", "b", "c"] {
            strategy.receive_completion(port, done(&run), &sink).unwrap();
        }

        assert_eq!(
            index_set(&sink.jobs()),
            HashSet::from([vec![0, 5], vec![1, 5]])
        );
        assert_eq!(sink.completions().len(), 1);
        assert_eq!(strategy.active_runs(), 0);
    }

    #[test]
    fn test_abort_run_releases_state() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(StrategyDefinition::dot);
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&run, "a", &[0]), &sink).unwrap();
        assert!(strategy.is_active(&run));

        strategy.abort_run(&run, &ctx(), &sink).unwrap();
        assert!(!strategy.is_active(&run));
        assert_eq!(sink.completions().len(), 1);

        // The finished marker went with the abort, so the scope starts afresh
        strategy.receive_job("a", job(&run, "a", &[1]), &sink).unwrap();
        assert!(strategy.is_active(&run));
    }

    #[test]
    fn test_release_run_emits_nothing() {
        let run = OwningProcess::new("run");
        let strategy = two_inputs(StrategyDefinition::dot);
        let sink = CollectingOutput::new();

        strategy.receive_job("a", job(&run, "a", &[0]), &sink).unwrap();
        strategy.release_run(&run);
        assert!(!strategy.is_active(&run));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unknown_port_is_contract_violation() {
        let strategy = two_inputs(cross_ab);
        let sink = CollectingOutput::new();
        let run = OwningProcess::new("run");
        let err = strategy
            .receive_job("zzz", job(&run, "zzz", &[0]), &sink)
            .unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_input_out_of_range() {
        let mut tree = StrategyTree::new();
        let terminal = tree.terminal();
        let dot = tree.dot_product();
        let a = tree.named_input("a", 0);
        let b = tree.named_input("b", 0);
        tree.insert(terminal, dot).unwrap();
        tree.insert(dot, a).unwrap();
        tree.insert(dot, b).unwrap();
        let strategy = Strategy::compile(tree, terminal).unwrap();

        let run = OwningProcess::new("run");
        let sink = CollectingOutput::new();
        let err = strategy
            .deliver_job(dot, 2, job(&run, "a", &[0]), &sink)
            .unwrap_err();
        assert_eq!(
            err,
            IterationError::InputOutOfRange {
                node: dot,
                input: 2,
                arity: 2
            }
        );

        // Delivering straight to a combining node works like a leaf would
        strategy.deliver_job(dot, 0, job(&run, "a", &[0]), &sink).unwrap();
        strategy.deliver_job(dot, 1, job(&run, "b", &[0]), &sink).unwrap();
        assert_eq!(sink.jobs().len(), 1);
    }

    #[test]
    fn test_compile_rejects_bad_topology() {
        let mut tree = StrategyTree::new();
        let terminal = tree.terminal();
        let dot = tree.dot_product();
        let a = tree.named_input("a", 0);
        tree.insert(terminal, dot).unwrap();
        tree.insert(dot, a).unwrap();
        let err = Strategy::compile(tree, terminal).unwrap_err();
        assert!(matches!(
            err,
            IterationError::Structural(StructuralError::WrongArity { found: 1, .. })
        ));

        let mut tree = StrategyTree::new();
        let cross = tree.cross_product();
        let err = Strategy::compile(tree, cross).unwrap_err();
        assert_eq!(
            err,
            IterationError::Structural(StructuralError::RootNotTerminal(cross))
        );
    }

    #[test]
    fn test_named_input_depth_arithmetic() {
        let strategy = Strategy::from_definition(&StrategyDefinition::input("a", 2)).unwrap();
        assert_eq!(strategy.iteration_depth(&supplied(&[("a", 2)])).unwrap(), 0);
        assert_eq!(strategy.iteration_depth(&supplied(&[("a", 3)])).unwrap(), 1);
        assert_eq!(strategy.iteration_depth(&supplied(&[("a", 1)])).unwrap(), 0);
    }

    #[test]
    fn test_depth_cross_sums() {
        let strategy = Strategy::from_definition(&StrategyDefinition::cross(vec![
            StrategyDefinition::input("a", 0),
            StrategyDefinition::input("b", 1),
        ]))
        .unwrap();
        let depth = strategy
            .iteration_depth(&supplied(&[("a", 2), ("b", 2)]))
            .unwrap();
        assert_eq!(depth, 3);
    }

    #[test]
    fn test_depth_dot_mismatch() {
        let strategy = two_inputs(StrategyDefinition::dot);
        assert_eq!(
            strategy
                .iteration_depth(&supplied(&[("a", 1), ("b", 1)]))
                .unwrap(),
            1
        );
        let err = strategy
            .iteration_depth(&supplied(&[("a", 1), ("b", 2)]))
            .unwrap_err();
        assert!(matches!(
            err,
            IterationError::IterationTypeMismatch {
                left: 1,
                right: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_depth_prefix_dot() {
        let strategy = two_inputs(StrategyDefinition::prefix_dot);
        assert_eq!(
            strategy
                .iteration_depth(&supplied(&[("a", 1), ("b", 2)]))
                .unwrap(),
            2
        );
        assert!(strategy
            .iteration_depth(&supplied(&[("a", 2), ("b", 1)]))
            .is_err());
    }

    #[test]
    fn test_depth_missing_input() {
        let strategy = two_inputs(cross_ab);
        let err = strategy.iteration_depth(&supplied(&[("a", 1)])).unwrap_err();
        assert_eq!(err, IterationError::MissingIterationInput("b".into()));
    }

    #[test]
    fn test_desired_cardinalities() {
        let strategy = Strategy::from_definition(&StrategyDefinition::cross(vec![
            StrategyDefinition::input("seq", 0),
            StrategyDefinition::input("db", 1),
        ]))
        .unwrap();
        let desired = strategy.desired_cardinalities();
        assert_eq!(desired["seq"], 0);
        assert_eq!(desired["db"], 1);
        assert_eq!(strategy.input_ports(), vec!["seq", "db"]);
        assert_eq!(strategy.node_count(), 4);
    }
}
