//! Compiler: converts a parsed processor into strategy definitions
//!
//! Takes a validated [`ParsedProcessor`] and produces a [`CompiledProcessor`]
//! holding the processor name and its stack of strategy layers.

use crate::errors::DslResult;
use crate::parser::{ParsedExpr, ParsedProcessor, Parser};
use crate::validator;
use iteration_engine::StrategyStack;
use iteration_types::{StackDefinition, StrategyDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A processor's name and iteration strategy stack
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledProcessor {
    pub name: String,
    pub stack: StackDefinition,
}

impl CompiledProcessor {
    /// Declared depth of each input
    pub fn desired_depths(&self) -> BTreeMap<String, usize> {
        self.stack
            .layers
            .first()
            .map(|layer| collect_depths(layer, BTreeMap::new()))
            .unwrap_or_default()
    }

    /// Build the runnable strategy stack
    pub fn build_stack(&self) -> DslResult<StrategyStack> {
        Ok(StrategyStack::from_definition(&self.stack)?)
    }
}

fn collect_depths(
    definition: &StrategyDefinition,
    mut depths: BTreeMap<String, usize>,
) -> BTreeMap<String, usize> {
    if let StrategyDefinition::Input { port, cardinality } = definition {
        depths.insert(port.clone(), *cardinality);
    }
    definition
        .children()
        .iter()
        .fold(depths, |acc, child| collect_depths(child, acc))
}

/// Compile DSL text into a processor definition
pub fn compile(input: &str) -> DslResult<CompiledProcessor> {
    let parsed = Parser::parse(input)?;
    validator::validate(&parsed)?;
    let compiled = compile_parsed(&parsed);
    tracing::debug!(
        processor = %compiled.name,
        layers = compiled.stack.layer_count(),
        "Compiled processor declaration"
    );
    Ok(compiled)
}

fn compile_parsed(parsed: &ParsedProcessor) -> CompiledProcessor {
    let depths: HashMap<&str, usize> = parsed
        .inputs
        .iter()
        .map(|input| (input.name.as_str(), input.depth))
        .collect();

    let layers = if parsed.layers.is_empty() {
        vec![StrategyDefinition::default_cross(
            parsed
                .inputs
                .iter()
                .map(|input| (input.name.as_str(), input.depth)),
        )]
    } else {
        parsed
            .layers
            .iter()
            .map(|layer| compile_expr(&layer.expr, &depths))
            .collect()
    };

    CompiledProcessor {
        name: parsed.name.clone(),
        stack: StackDefinition::new(layers),
    }
}

/// Operators and ports were checked by the validator
fn compile_expr(expr: &ParsedExpr, depths: &HashMap<&str, usize>) -> StrategyDefinition {
    match expr {
        ParsedExpr::Port { name, .. } => {
            StrategyDefinition::input(name.clone(), depths.get(name.as_str()).copied().unwrap_or(0))
        }
        ParsedExpr::Operator { name, operands, .. } => {
            let children = operands.iter().map(|e| compile_expr(e, depths)).collect();
            match name.as_str() {
                "dot" => StrategyDefinition::Dot { children },
                "prefix_dot" => StrategyDefinition::PrefixDot { children },
                _ => StrategyDefinition::Cross { children },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DslError;
    use iteration_types::IterationError;

    const BLAST: &str = r#"
        PROCESSOR "blast" {
            INPUT query DEPTH 0
            INPUT database DEPTH 0
            INPUT options DEPTH 1
            LAYER cross(dot(query, database), options)
        }
    "#;

    #[test]
    fn test_compile_layer() {
        let compiled = compile(BLAST).unwrap();
        assert_eq!(compiled.name, "blast");
        assert_eq!(compiled.stack.layer_count(), 1);
        assert_eq!(
            compiled.stack.layers[0],
            StrategyDefinition::cross(vec![
                StrategyDefinition::dot(
                    StrategyDefinition::input("query", 0),
                    StrategyDefinition::input("database", 0),
                ),
                StrategyDefinition::input("options", 1),
            ])
        );
        assert_eq!(compiled.desired_depths()["options"], 1);
    }

    #[test]
    fn test_default_cross_of_all_inputs() {
        let compiled = compile(r#"PROCESSOR "p" { INPUT b DEPTH 1 INPUT a DEPTH 0 }"#).unwrap();
        assert_eq!(
            compiled.stack.layers,
            vec![StrategyDefinition::cross(vec![
                StrategyDefinition::input("b", 1),
                StrategyDefinition::input("a", 0),
            ])]
        );
    }

    #[test]
    fn test_build_stack_and_depth() {
        let stack = compile(BLAST).unwrap().build_stack().unwrap();
        let supplied: HashMap<String, usize> = [("query", 1), ("database", 1), ("options", 2)]
            .into_iter()
            .map(|(p, d)| (p.to_string(), d))
            .collect();
        // dot(1, 1) = 1, options 2 - 1 = 1, cross sums
        assert_eq!(stack.iteration_depth(&supplied).unwrap(), 2);

        let mismatched: HashMap<String, usize> = [("query", 1), ("database", 2), ("options", 1)]
            .into_iter()
            .map(|(p, d)| (p.to_string(), d))
            .collect();
        assert!(matches!(
            stack.iteration_depth(&mismatched),
            Err(IterationError::IterationTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_validation_errors_surface() {
        let err = compile(r#"PROCESSOR "p" { INPUT a DEPTH 0 LAYER dot(a) }"#).unwrap_err();
        assert!(matches!(err, DslError::WrongOperandCount { found: 1, .. }));
    }

    #[test]
    fn test_serde_roundtrip() {
        let compiled = compile(BLAST).unwrap();
        let json = serde_json::to_string(&compiled).unwrap();
        let restored: CompiledProcessor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, compiled);
    }
}
