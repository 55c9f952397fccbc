//! Iteration Strategy DSL
//!
//! A small language for declaring a processor's input ports and the
//! iteration strategy layers that combine them. Declarations compile down to
//! a `StackDefinition` from the `iteration-types` crate.
//!
//! # DSL Syntax
//!
//! ```text
//! PROCESSOR "blast" {
//!     INPUT query DEPTH 0
//!     INPUT database DEPTH 0
//!     INPUT options DEPTH 1
//!
//!     # one layer per line, applied in order
//!     LAYER cross(dot(query, database), options)
//! }
//! ```
//!
//! `DEPTH` is the collection depth the processor itself expects on the
//! port; anything deeper is iterated over. Operators are `cross` (one or more
//! operands), `dot` and `prefix_dot` (exactly two). Each `LAYER` must use
//! every declared input exactly once. Without any `LAYER` the inputs are
//! combined by a cross product in declaration order.
//!
//! # Usage
//!
//! ```rust
//! use iteration_dsl::compile;
//!
//! let dsl = r#"
//! PROCESSOR "align" {
//!     INPUT left DEPTH 0
//!     INPUT right DEPTH 0
//!     LAYER dot(left, right)
//! }
//! "#;
//!
//! let processor = compile(dsl).unwrap();
//! assert_eq!(processor.name, "align");
//! assert_eq!(processor.stack.layer_count(), 1);
//! ```

#![deny(unsafe_code)]

pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod validator;

pub use compiler::{compile, CompiledProcessor};
pub use errors::{DslError, DslResult};
