//! Validator: checks parsed processors for semantic correctness
//!
//! Validation happens after parsing but before compilation. It catches
//! declarations that are syntactically valid but cannot form a strategy.

use crate::errors::{DslError, DslResult};
use crate::parser::{ParsedExpr, ParsedLayer, ParsedProcessor};
use std::collections::{HashMap, HashSet};

/// Operator names and the operand counts they accept
pub const OPERATORS: &[(&str, &str)] = &[
    ("cross", "at least 1"),
    ("dot", "exactly 2"),
    ("prefix_dot", "exactly 2"),
];

/// Validate a parsed processor for semantic correctness
pub fn validate(processor: &ParsedProcessor) -> DslResult<()> {
    validate_has_inputs(processor)?;
    validate_unique_inputs(processor)?;
    for layer in &processor.layers {
        validate_operators(&layer.expr)?;
        validate_layer_ports(processor, layer)?;
    }
    Ok(())
}

fn validate_has_inputs(processor: &ParsedProcessor) -> DslResult<()> {
    if processor.inputs.is_empty() {
        return Err(DslError::ValidationError(format!(
            "Processor '{}' must declare at least one INPUT",
            processor.name
        )));
    }
    Ok(())
}

fn validate_unique_inputs(processor: &ParsedProcessor) -> DslResult<()> {
    let mut seen = HashSet::new();
    for input in &processor.inputs {
        if !seen.insert(&input.name) {
            return Err(DslError::DuplicateInput(input.name.clone()));
        }
    }
    Ok(())
}

fn validate_operators(expr: &ParsedExpr) -> DslResult<()> {
    let ParsedExpr::Operator {
        name,
        operands,
        line,
        col,
    } = expr
    else {
        return Ok(());
    };

    let arity_ok = match name.as_str() {
        "cross" => !operands.is_empty(),
        "dot" | "prefix_dot" => operands.len() == 2,
        _ => {
            return Err(DslError::UnknownOperator {
                name: name.clone(),
                line: *line,
                col: *col,
            })
        }
    };
    if !arity_ok {
        let expected = OPERATORS
            .iter()
            .find(|(op, _)| op == name)
            .map_or("", |(_, expected)| *expected);
        return Err(DslError::WrongOperandCount {
            operator: name.clone(),
            expected,
            found: operands.len(),
            line: *line,
        });
    }

    operands.iter().try_for_each(validate_operators)
}

/// Every declared input must appear in the layer exactly once
fn validate_layer_ports(processor: &ParsedProcessor, layer: &ParsedLayer) -> DslResult<()> {
    let declared: HashSet<&str> = processor.inputs.iter().map(|i| i.name.as_str()).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for (name, line, col) in layer.expr.ports() {
        if !declared.contains(name) {
            return Err(DslError::UnknownInput {
                name: name.to_string(),
                line,
                col,
            });
        }
        *counts.entry(name).or_default() += 1;
    }

    for input in &processor.inputs {
        match counts.get(input.name.as_str()).copied().unwrap_or(0) {
            1 => {}
            0 => {
                return Err(DslError::ValidationError(format!(
                    "LAYER at line {} does not use input '{}'",
                    layer.line, input.name
                )))
            }
            n => {
                return Err(DslError::ValidationError(format!(
                    "LAYER at line {} uses input '{}' {} times",
                    layer.line, input.name, n
                )))
            }
        }
    }
    Ok(())
}
