//! DSL error types

use iteration_types::IterationError;

/// Errors that can occur during DSL parsing, validation, or compilation
#[derive(Debug, thiserror::Error)]
pub enum DslError {
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Unexpected token at line {line}, column {col}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        col: usize,
    },

    #[error("Unexpected end of input: expected {0}")]
    UnexpectedEof(String),

    #[error("Unknown keyword: '{0}'")]
    UnknownKeyword(String),

    #[error("Unknown operator '{name}' at line {line}, column {col}")]
    UnknownOperator { name: String, line: usize, col: usize },

    #[error("Input declared more than once: '{0}'")]
    DuplicateInput(String),

    #[error("Undeclared input '{name}' at line {line}, column {col}")]
    UnknownInput { name: String, line: usize, col: usize },

    #[error("'{operator}' at line {line} takes {expected} operands, found {found}")]
    WrongOperandCount {
        operator: String,
        expected: &'static str,
        found: usize,
        line: usize,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Iteration error: {0}")]
    Iteration(#[from] IterationError),
}

/// Result type alias for DSL operations
pub type DslResult<T> = Result<T, DslError>;
