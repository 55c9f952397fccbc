//! Iteration Strategy Engine
//!
//! Turns per-port streams of jobs into the jobs a processor is actually
//! invoked with. An iteration strategy is a tree: named inputs at the leaves,
//! combining nodes in between and a terminal at the root that delivers to an
//! output sink.
//!
//! # Key Concepts
//!
//! - **Cross product**: every combination of its children's elements. Merged
//!   indices are the children's indices concatenated in child order.
//! - **Dot product**: pairs elements with identical indices.
//! - **Prefix dot product**: pairs each element of a shallow child with every
//!   element of a deeper child whose index starts with it.
//! - **Completion**: a node reports a run complete exactly once, after every
//!   child has finished and at least one genuine completion arrived.
//! - **Strategy stack**: layers of strategies, each feeding the next.
//!
//! # Design Principles
//!
//! 1. The tree is built and checked up front, then frozen by
//!    [`Strategy::compile`]. Nothing is restructured while jobs flow.
//! 2. Each combining node guards its state with its own lock. Locks are
//!    acquired child to parent only.
//! 3. All per-run state is keyed by owning process and released as soon as
//!    the run completes at that node.

#![deny(unsafe_code)]

mod completion;
mod cross_product;
mod dot_product;
mod output;
mod stack;
mod strategy;
mod tree;
mod tree_cache;

pub use output::{CollectingOutput, StrategyOutput};
pub use stack::StrategyStack;
pub use strategy::Strategy;
pub use tree::StrategyTree;
pub use tree_cache::TreeCache;
