//! Error types for the iteration layer

use crate::NodeId;

/// Bad strategy topology, raised while a tree is being built or compiled
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node cannot be its own parent: {0}")]
    SelfParent(NodeId),

    #[error("Inserting {child} under {parent} would make {child} its own ancestor")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("{kind} node {node} does not accept children")]
    ChildrenNotAllowed { node: NodeId, kind: &'static str },

    #[error("{kind} node {node} accepts at most {max} children")]
    TooManyChildren {
        node: NodeId,
        kind: &'static str,
        max: usize,
    },

    #[error("Position {position} out of range for {node} with {len} children")]
    InvalidPosition {
        node: NodeId,
        position: usize,
        len: usize,
    },

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Strategy root must be a terminal node, found {0}")]
    RootNotTerminal(NodeId),

    #[error("{kind} node {node} needs {expected} children, has {found}")]
    WrongArity {
        node: NodeId,
        kind: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Input port declared more than once: {0}")]
    DuplicatePort(String),
}

/// Errors that can occur in iteration operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IterationError {
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Iteration type mismatch at {node}: depths {left} and {right} cannot be combined")]
    IterationTypeMismatch {
        node: NodeId,
        left: usize,
        right: usize,
    },

    #[error("Missing iteration input: no depth supplied for port '{0}'")]
    MissingIterationInput(String),

    #[error("Contract violation: input {input} out of range for {node} with {arity} inputs")]
    InputOutOfRange {
        node: NodeId,
        input: usize,
        arity: usize,
    },

    #[error("Contract violation: unknown input port '{0}'")]
    UnknownInputPort(String),
}

impl IterationError {
    /// Whether this error is a caller programming error rather than a
    /// validation outcome
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InputOutOfRange { .. } | Self::UnknownInputPort(_)
        )
    }
}

/// Result type alias for iteration operations
pub type IterationResult<T> = Result<T, IterationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IterationError::from(StructuralError::SelfParent(NodeId(3)));
        assert_eq!(
            err.to_string(),
            "Structural error: Node cannot be its own parent: node#3"
        );

        let err = IterationError::MissingIterationInput("seq".into());
        assert!(err.to_string().contains("'seq'"));
        assert!(!err.is_contract_violation());

        let err = IterationError::InputOutOfRange {
            node: NodeId(1),
            input: 2,
            arity: 2,
        };
        assert!(err.is_contract_violation());
    }
}
