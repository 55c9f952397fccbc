//! Strategy stacks: layers of strategies applied one after another
//!
//! Events enter the first layer. Each layer's merged jobs are split per port
//! into the next layer's input leaves; each completion is handed to every
//! leaf of the next layer. The last layer delivers to the caller's sink. An
//! empty stack passes events through untouched.

use crate::output::StrategyOutput;
use crate::strategy::Strategy;
use iteration_types::{
    Completion, InvocationContext, IterationError, IterationResult, Job, OwningProcess,
    StackDefinition,
};
use std::collections::{BTreeMap, HashMap};

/// Ordered list of strategies, each consuming the previous layer's output
#[derive(Clone, Debug, Default)]
pub struct StrategyStack {
    layers: Vec<Strategy>,
}

impl StrategyStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definition(definition: &StackDefinition) -> IterationResult<Self> {
        let layers = definition
            .layers
            .iter()
            .map(Strategy::from_definition)
            .collect::<IterationResult<Vec<_>>>()?;
        tracing::info!(layers = layers.len(), "Strategy stack built");
        Ok(Self { layers })
    }

    pub fn push_layer(&mut self, strategy: Strategy) {
        self.layers.push(strategy);
    }

    pub fn with_layer(mut self, strategy: Strategy) -> Self {
        self.push_layer(strategy);
        self
    }

    pub fn layers(&self) -> &[Strategy] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Desired depth per port, as declared by the first layer
    pub fn desired_cardinalities(&self) -> BTreeMap<String, usize> {
        self.layers
            .first()
            .map(Strategy::desired_cardinalities)
            .unwrap_or_default()
    }

    /// Total implicit iteration depth across all layers.
    ///
    /// Each layer iterates away whatever exceeds its declared depths, so the
    /// next layer sees every port reduced to at most what the previous layer
    /// asked for.
    pub fn iteration_depth(&self, supplied: &HashMap<String, usize>) -> IterationResult<usize> {
        let mut depths = supplied.clone();
        let mut total = 0;
        for layer in &self.layers {
            total += layer.iteration_depth(&depths)?;
            for (port, desired) in layer.desired_cardinalities() {
                if let Some(depth) = depths.get_mut(&port) {
                    *depth = (*depth).min(desired);
                }
            }
        }
        Ok(total)
    }

    pub fn receive_job(
        &self,
        port: &str,
        job: Job,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        match self.layers.first() {
            Some(first) => self.with_layer_output(0, output, |next| first.receive_job(port, job, next)),
            None => output.receive_job(job),
        }
    }

    pub fn receive_completion(
        &self,
        port: &str,
        completion: Completion,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        match self.layers.first() {
            Some(first) => self.with_layer_output(0, output, |next| {
                first.receive_completion(port, completion, next)
            }),
            None => output.receive_completion(completion),
        }
    }

    /// Cancel a run in every layer.
    ///
    /// Synthetic completions enter the first layer only; its completion
    /// flows through the later layers like any other, and whatever they
    /// still hold for the run is then released silently. An empty stack
    /// forwards one completion.
    pub fn abort_run(
        &self,
        owning_process: &OwningProcess,
        context: &InvocationContext,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let Some(first) = self.layers.first() else {
            return output.receive_completion(Completion::whole(
                owning_process.clone(),
                context.clone(),
            ));
        };
        self.with_layer_output(0, output, |next| {
            first.abort_run(owning_process, context, next)
        })?;
        for strategy in &self.layers[1..] {
            strategy.release_run(owning_process);
        }
        Ok(())
    }

    /// Runs holding state, summed over layers
    pub fn active_runs(&self) -> usize {
        self.layers.iter().map(Strategy::active_runs).sum()
    }

    /// Call `f` with the sink that layer `layer` should emit into
    fn with_layer_output<R>(
        &self,
        layer: usize,
        output: &dyn StrategyOutput,
        f: impl FnOnce(&dyn StrategyOutput) -> R,
    ) -> R {
        if layer + 1 < self.layers.len() {
            let bridge = LayerBridge {
                stack: self,
                next: layer + 1,
                output,
            };
            f(&bridge)
        } else {
            f(output)
        }
    }

    fn feed_job(&self, layer: usize, job: Job, output: &dyn StrategyOutput) -> IterationResult<()> {
        let strategy = &self.layers[layer];
        self.with_layer_output(layer, output, |next| {
            for port in strategy.input_ports() {
                let part = job
                    .restrict_to(port)
                    .ok_or_else(|| IterationError::MissingIterationInput(port.to_string()))?;
                strategy.receive_job(port, part, next)?;
            }
            Ok(())
        })
    }

    fn feed_completion(
        &self,
        layer: usize,
        completion: Completion,
        output: &dyn StrategyOutput,
    ) -> IterationResult<()> {
        let strategy = &self.layers[layer];
        self.with_layer_output(layer, output, |next| {
            for port in strategy.input_ports() {
                strategy.receive_completion(port, completion.clone(), next)?;
            }
            Ok(())
        })
    }
}

/// Sink that feeds one layer's output into the next layer
struct LayerBridge<'a> {
    stack: &'a StrategyStack,
    next: usize,
    output: &'a dyn StrategyOutput,
}

impl StrategyOutput for LayerBridge<'_> {
    fn receive_job(&self, job: Job) -> IterationResult<()> {
        self.stack.feed_job(self.next, job, self.output)
    }

    fn receive_completion(&self, completion: Completion) -> IterationResult<()> {
        self.stack.feed_completion(self.next, completion, self.output)
    }
}
