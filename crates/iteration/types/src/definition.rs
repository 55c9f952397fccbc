//! Strategy definitions: node kinds and declarative strategy trees
//!
//! A processor's iteration behaviour is described by a tree whose leaves are
//! its named input ports and whose inner nodes combine their children's
//! index spaces. The same tree can be assembled by hand through the engine's
//! build-time API or from a [`StrategyDefinition`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Identifiers ──────────────────────────────────────────────────────

/// Handle to a node in a strategy tree's flat node store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// ── Node Kind ────────────────────────────────────────────────────────

/// The kind of a strategy node, with any kind-specific configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Every combination of the children's elements
    CrossProduct,
    /// Elements with identical index arrays on both children
    DotProduct,
    /// Child 0's indices are prefixes of child 1's
    PrefixDotProduct,
    /// A declared processor input port
    NamedInput {
        port: String,
        desired_cardinality: usize,
    },
    /// Root of a strategy; hands merged output to the enclosing stack
    Terminal,
}

impl NodeKind {
    pub fn named_input(port: impl Into<String>, desired_cardinality: usize) -> Self {
        Self::NamedInput {
            port: port.into(),
            desired_cardinality,
        }
    }

    /// Upper bound on children, if any
    pub fn max_children(&self) -> Option<usize> {
        match self {
            Self::CrossProduct => None,
            Self::DotProduct | Self::PrefixDotProduct => Some(2),
            Self::NamedInput { .. } => Some(0),
            Self::Terminal => Some(1),
        }
    }

    /// Whether the node buffers and combines its children's jobs
    pub fn is_combining(&self) -> bool {
        matches!(
            self,
            Self::CrossProduct | Self::DotProduct | Self::PrefixDotProduct
        )
    }

    pub fn port(&self) -> Option<&str> {
        match self {
            Self::NamedInput { port, .. } => Some(port),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CrossProduct => "cross",
            Self::DotProduct => "dot",
            Self::PrefixDotProduct => "prefix_dot",
            Self::NamedInput { .. } => "input",
            Self::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NamedInput {
                port,
                desired_cardinality,
            } => write!(f, "input({}, depth {})", port, desired_cardinality),
            other => write!(f, "{}", other.label()),
        }
    }
}

// ── Strategy Definition ──────────────────────────────────────────────

/// Declarative description of one iteration strategy (below its terminal)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDefinition {
    Cross {
        children: Vec<StrategyDefinition>,
    },
    Dot {
        children: Vec<StrategyDefinition>,
    },
    PrefixDot {
        children: Vec<StrategyDefinition>,
    },
    Input {
        port: String,
        #[serde(default)]
        cardinality: usize,
    },
}

impl StrategyDefinition {
    pub fn input(port: impl Into<String>, cardinality: usize) -> Self {
        Self::Input {
            port: port.into(),
            cardinality,
        }
    }

    pub fn cross(children: Vec<StrategyDefinition>) -> Self {
        Self::Cross { children }
    }

    pub fn dot(left: StrategyDefinition, right: StrategyDefinition) -> Self {
        Self::Dot {
            children: vec![left, right],
        }
    }

    pub fn prefix_dot(shallow: StrategyDefinition, deep: StrategyDefinition) -> Self {
        Self::PrefixDot {
            children: vec![shallow, deep],
        }
    }

    /// The default strategy: cross product of every port in order
    pub fn default_cross<'a, I>(ports: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        Self::cross(
            ports
                .into_iter()
                .map(|(port, cardinality)| Self::input(port, cardinality))
                .collect(),
        )
    }

    /// Node kind of this definition's root
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Cross { .. } => NodeKind::CrossProduct,
            Self::Dot { .. } => NodeKind::DotProduct,
            Self::PrefixDot { .. } => NodeKind::PrefixDotProduct,
            Self::Input { port, cardinality } => NodeKind::named_input(port.clone(), *cardinality),
        }
    }

    pub fn children(&self) -> &[StrategyDefinition] {
        match self {
            Self::Cross { children } | Self::Dot { children } | Self::PrefixDot { children } => {
                children
            }
            Self::Input { .. } => &[],
        }
    }

    /// Ports referenced by the leaves, left to right
    pub fn input_ports(&self) -> Vec<&str> {
        let mut ports = Vec::new();
        self.collect_ports(&mut ports);
        ports
    }

    fn collect_ports<'a>(&'a self, ports: &mut Vec<&'a str>) {
        match self {
            Self::Input { port, .. } => ports.push(port),
            other => {
                for child in other.children() {
                    child.collect_ports(ports);
                }
            }
        }
    }

    /// First port referenced by more than one leaf
    pub fn duplicate_port(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.input_ports().into_iter().find(|port| !seen.insert(*port))
    }
}

impl std::fmt::Display for StrategyDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input { port, .. } => write!(f, "{}", port),
            other => {
                write!(f, "{}(", other.kind().label())?;
                for (i, child) in other.children().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

// ── Stack Definition ─────────────────────────────────────────────────

/// Ordered layers of strategies for one processor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    pub layers: Vec<StrategyDefinition>,
}

impl StackDefinition {
    pub fn new(layers: Vec<StrategyDefinition>) -> Self {
        Self { layers }
    }

    pub fn single(layer: StrategyDefinition) -> Self {
        Self::new(vec![layer])
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
