//! Strategy tree: build-time topology of an iteration strategy
//!
//! Nodes live in a flat store and refer to each other through [`NodeId`]
//! handles. All topology invariants are enforced at this mutation API:
//! - a node has at most one parent and is never its own ancestor
//! - inserting a child that already has a parent moves it
//! - a named input has no children, a terminal at most one, and a dot or
//!   prefix-dot node at most two
//!
//! Trees are built single-threaded during workflow compilation and then
//! frozen by [`Strategy::compile`](crate::Strategy::compile).

use iteration_types::{
    IterationResult, NodeId, NodeKind, StrategyDefinition, StructuralError,
};

#[derive(Clone, Debug)]
pub(crate) struct TreeNode {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// Mutable strategy topology
#[derive(Clone, Debug, Default)]
pub struct StrategyTree {
    nodes: Vec<TreeNode>,
}

impl StrategyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a definition; returns the tree and its terminal
    pub fn from_definition(definition: &StrategyDefinition) -> IterationResult<(Self, NodeId)> {
        if let Some(port) = definition.duplicate_port() {
            return Err(StructuralError::DuplicatePort(port.to_string()).into());
        }
        let mut tree = Self::new();
        let terminal = tree.add_node(NodeKind::Terminal);
        let top = tree.add_definition(definition)?;
        tree.insert(terminal, top)?;
        Ok((tree, terminal))
    }

    fn add_definition(&mut self, definition: &StrategyDefinition) -> IterationResult<NodeId> {
        let node = self.add_node(definition.kind());
        for child in definition.children() {
            let child = self.add_definition(child)?;
            self.insert(node, child)?;
        }
        Ok(node)
    }

    /// Add a detached node to the store
    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TreeNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn terminal(&mut self) -> NodeId {
        self.add_node(NodeKind::Terminal)
    }

    pub fn cross_product(&mut self) -> NodeId {
        self.add_node(NodeKind::CrossProduct)
    }

    pub fn dot_product(&mut self) -> NodeId {
        self.add_node(NodeKind::DotProduct)
    }

    pub fn prefix_dot_product(&mut self) -> NodeId {
        self.add_node(NodeKind::PrefixDotProduct)
    }

    pub fn named_input(&mut self, port: impl Into<String>, desired_cardinality: usize) -> NodeId {
        self.add_node(NodeKind::named_input(port, desired_cardinality))
    }

    pub fn kind(&self, id: NodeId) -> IterationResult<&NodeKind> {
        Ok(&self.node(id)?.kind)
    }

    pub fn parent(&self, id: NodeId) -> IterationResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> IterationResult<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    /// Position of a node in its parent's child list
    pub fn position(&self, id: NodeId) -> IterationResult<Option<usize>> {
        let node = self.node(id)?;
        Ok(node.parent.and_then(|parent| {
            self.nodes[parent.index()]
                .children
                .iter()
                .position(|c| *c == id)
        }))
    }

    /// Total number of nodes in the store, attached or not
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Append a child, moving it if it already has a parent
    pub fn insert(&mut self, parent: NodeId, child: NodeId) -> IterationResult<()> {
        let len = self.node(parent)?.children.len();
        let already_here = self.node(child)?.parent == Some(parent);
        let position = if already_here { len - 1 } else { len };
        self.insert_at(parent, child, position)
    }

    /// Insert a child at a position, moving it if it already has a parent.
    ///
    /// When the child already belongs to `parent`, `position` refers to the
    /// child list after the child has been taken out.
    pub fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        position: usize,
    ) -> IterationResult<()> {
        self.node(child)?;
        let parent_node = self.node(parent)?;
        if parent == child {
            return Err(StructuralError::SelfParent(child).into());
        }
        if let Some(max) = parent_node.kind.max_children() {
            if max == 0 {
                return Err(StructuralError::ChildrenNotAllowed {
                    node: parent,
                    kind: parent_node.kind.label(),
                }
                .into());
            }
            let moving_within = self.nodes[child.index()].parent == Some(parent);
            if !moving_within && parent_node.children.len() >= max {
                return Err(StructuralError::TooManyChildren {
                    node: parent,
                    kind: parent_node.kind.label(),
                    max,
                }
                .into());
            }
        }
        if self.is_ancestor(child, parent) {
            return Err(StructuralError::Cycle { parent, child }.into());
        }

        let len_after_detach = match self.nodes[child.index()].parent {
            Some(current) if current == parent => parent_node.children.len() - 1,
            _ => parent_node.children.len(),
        };
        if position > len_after_detach {
            return Err(StructuralError::InvalidPosition {
                node: parent,
                position,
                len: len_after_detach,
            }
            .into());
        }

        self.detach(child);
        self.nodes[parent.index()].children.insert(position, child);
        self.nodes[child.index()].parent = Some(parent);
        Ok(())
    }

    /// Detach a child from this parent
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> IterationResult<()> {
        self.node(child)?;
        if self.node(parent)?.children.contains(&child) {
            self.detach(child);
            Ok(())
        } else {
            Err(StructuralError::NotAChild { parent, child }.into())
        }
    }

    /// Detach the child at a position, returning it
    pub fn remove_at(&mut self, parent: NodeId, position: usize) -> IterationResult<NodeId> {
        let children = &self.node(parent)?.children;
        let child = *children
            .get(position)
            .ok_or(StructuralError::InvalidPosition {
                node: parent,
                position,
                len: children.len(),
            })?;
        self.detach(child);
        Ok(child)
    }

    /// Detach every child of this node
    pub fn clear(&mut self, parent: NodeId) -> IterationResult<()> {
        let children = std::mem::take(&mut self.node_mut(parent)?.children);
        for child in children {
            self.nodes[child.index()].parent = None;
        }
        Ok(())
    }

    /// Attach to a new parent (appended), or detach with `None`
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> IterationResult<()> {
        match parent {
            Some(parent) => self.insert(parent, child),
            None => {
                self.node(child)?;
                self.detach(child);
                Ok(())
            }
        }
    }

    /// Named-input leaves below a node, left to right
    pub fn leaves(&self, root: NodeId) -> IterationResult<Vec<NodeId>> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        self.node(root)?;
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            if matches!(node.kind, NodeKind::NamedInput { .. }) {
                leaves.push(id);
            }
            stack.extend(node.children.iter().rev());
        }
        Ok(leaves)
    }

    /// Whether `ancestor` is `node` or lies on its parent chain
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.index()].parent;
        }
        false
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|c| *c != child);
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> IterationResult<&TreeNode> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| StructuralError::UnknownNode(id).into())
    }

    fn node_mut(&mut self, id: NodeId) -> IterationResult<&mut TreeNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| StructuralError::UnknownNode(id).into())
    }
}
