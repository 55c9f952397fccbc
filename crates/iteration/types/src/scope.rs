//! Owning-process scopes: the partition key for per-run iteration state
//!
//! Every nesting level of a (possibly nested) workflow invocation pushes one
//! scope id. Two jobs or completions are correlated only when their scopes
//! match exactly, so the scope stack is what keeps concurrent runs apart
//! inside a shared strategy tree.
//!
//! The stack is persistent: frames are shared between a scope and the scopes
//! derived from it, which makes push and pop O(1).

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator used by the textual form of an owning process
pub const SCOPE_SEPARATOR: char = ':';

// ── Scope Id ─────────────────────────────────────────────────────────

/// Identifier for a single nesting level
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Owning Process ───────────────────────────────────────────────────

#[derive(Debug)]
struct ScopeFrame {
    id: ScopeId,
    parent: Option<Arc<ScopeFrame>>,
}

/// Immutable stack of scope ids, innermost scope on top
#[derive(Clone, Debug, Default)]
pub struct OwningProcess {
    top: Option<Arc<ScopeFrame>>,
    depth: usize,
}

impl OwningProcess {
    /// The empty scope stack
    pub fn root() -> Self {
        Self::default()
    }

    /// A scope stack holding a single id
    pub fn new(id: impl Into<String>) -> Self {
        Self::root().push(id)
    }

    /// Build a scope stack from ids listed outermost first
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().fold(Self::root(), |scope, id| scope.push(id))
    }

    /// Enter a nested scope
    pub fn push(&self, id: impl Into<String>) -> Self {
        Self {
            top: Some(Arc::new(ScopeFrame {
                id: ScopeId::new(id),
                parent: self.top.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Leave the innermost scope, returning its id and the enclosing scope
    pub fn pop(&self) -> Option<(ScopeId, Self)> {
        self.top.as_ref().map(|frame| {
            (
                frame.id.clone(),
                Self {
                    top: frame.parent.clone(),
                    depth: self.depth - 1,
                },
            )
        })
    }

    /// The innermost scope id
    pub fn current(&self) -> Option<&ScopeId> {
        self.top.as_ref().map(|frame| &frame.id)
    }

    /// Number of nesting levels
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Scope ids from innermost to outermost
    pub fn iter(&self) -> impl Iterator<Item = &ScopeId> {
        let mut next = self.top.as_deref();
        std::iter::from_fn(move || {
            let frame = next?;
            next = frame.parent.as_deref();
            Some(&frame.id)
        })
    }

    /// Scope ids from outermost to innermost
    pub fn ids(&self) -> Vec<ScopeId> {
        let mut ids: Vec<ScopeId> = self.iter().cloned().collect();
        ids.reverse();
        ids
    }
}

impl PartialEq for OwningProcess {
    fn eq(&self, other: &Self) -> bool {
        if self.depth != other.depth {
            return false;
        }
        let mut left = self.top.as_ref();
        let mut right = other.top.as_ref();
        loop {
            match (left, right) {
                (None, None) => return true,
                (Some(a), Some(b)) => {
                    // Shared tails are equal without walking them
                    if Arc::ptr_eq(a, b) {
                        return true;
                    }
                    if a.id != b.id {
                        return false;
                    }
                    left = a.parent.as_ref();
                    right = b.parent.as_ref();
                }
                _ => return false,
            }
        }
    }
}

impl Eq for OwningProcess {}

impl Hash for OwningProcess {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.depth.hash(state);
        for id in self.iter() {
            id.hash(state);
        }
    }
}

impl std::fmt::Display for OwningProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = self.ids();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SCOPE_SEPARATOR)?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for OwningProcess {
    type Err = std::convert::Infallible;

    /// Parse the colon-joined form; the empty string is the root scope
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self::from_ids(s.split(SCOPE_SEPARATOR)))
    }
}

/// Serialized as the list of scope ids, outermost first, so ids that
/// contain the separator survive the round trip
impl Serialize for OwningProcess {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.ids())
    }
}

impl<'de> Deserialize<'de> for OwningProcess {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ids = Vec::<ScopeId>::deserialize(deserializer)?;
        Ok(Self::from_ids(ids.into_iter().map(|id| id.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_push_and_pop() {
        let run = OwningProcess::new("facade0");
        let nested = run.push("dataflow2").push("proc");

        assert_eq!(nested.depth(), 3);
        assert_eq!(nested.current(), Some(&ScopeId::new("proc")));

        let (popped, outer) = nested.pop().unwrap();
        assert_eq!(popped, ScopeId::new("proc"));
        assert_eq!(outer.depth(), 2);
        assert_eq!(outer.to_string(), "facade0:dataflow2");

        // The nested scope is untouched
        assert_eq!(nested.to_string(), "facade0:dataflow2:proc");
    }

    #[test]
    fn test_pop_root() {
        assert!(OwningProcess::root().pop().is_none());
        assert!(OwningProcess::root().is_root());
    }

    #[test]
    fn test_structural_equality() {
        let a = OwningProcess::from_ids(["run1", "nested"]);
        let b = OwningProcess::new("run1").push("nested");
        let c = OwningProcess::new("run2").push("nested");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, OwningProcess::new("run1"));
    }

    #[test]
    fn test_hash_partitions_runs() {
        let mut state: HashMap<OwningProcess, u32> = HashMap::new();
        *state.entry(OwningProcess::from_ids(["r", "p"])).or_default() += 1;
        *state.entry(OwningProcess::new("r").push("p")).or_default() += 1;
        *state.entry(OwningProcess::new("r2").push("p")).or_default() += 1;

        assert_eq!(state.len(), 2);
        assert_eq!(state[&OwningProcess::from_ids(["r", "p"])], 2);
    }

    #[test]
    fn test_parse_display_round_trip() {
        let scope: OwningProcess = "facade0:wf1:proc2".parse().unwrap();
        assert_eq!(scope.depth(), 3);
        assert_eq!(scope.to_string(), "facade0:wf1:proc2");

        let ids: Vec<&str> = scope.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["proc2", "wf1", "facade0"]);

        let empty: OwningProcess = "".parse().unwrap();
        assert!(empty.is_root());
    }

    #[test]
    fn test_serde_as_id_list() {
        let scope = OwningProcess::from_ids(["a", "b"]);
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: OwningProcess = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);

        let root: OwningProcess = serde_json::from_str("[]").unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn test_serde_keeps_separator_inside_id() {
        let scope = OwningProcess::new("run").push("a:b");
        let json = serde_json::to_string(&scope).unwrap();

        let back: OwningProcess = serde_json::from_str(&json).unwrap();
        assert_eq!(back.depth(), 2);
        assert_eq!(back, scope);
        assert_eq!(back.current(), Some(&ScopeId::new("a:b")));
    }
}
