//! Iteration Domain Types
//!
//! A processor with several input ports may receive collections whose depth
//! is only known at run time. The iteration engine decides how individual
//! elements are paired into per-invocation jobs. These are the values that
//! flow through it.
//!
//! # Key Concepts
//!
//! - **Job**: a (possibly partial) unit of per-element data, addressed by an
//!   owning-process scope and an index array.
//! - **Completion**: a signal that no further jobs will arrive under an
//!   index prefix on an input. An empty index means the input is done for
//!   the run.
//! - **OwningProcess**: the stack of scope ids identifying a workflow run and
//!   its nesting level. All per-run state is partitioned by it.
//! - **StrategyDefinition**: a declarative description of an iteration
//!   strategy tree (cross, dot and prefix-dot products over named inputs).
//!
//! # Design Principles
//!
//! 1. Jobs and completions are immutable. Transformations return new values.
//! 2. Data references and invocation contexts are opaque and threaded through
//!    unchanged.
//! 3. Structural problems surface at build time, never while jobs flow.

#![deny(unsafe_code)]

mod context;
mod definition;
mod errors;
mod job;
mod scope;

pub use context::*;
pub use definition::*;
pub use errors::*;
pub use job::*;
pub use scope::*;
