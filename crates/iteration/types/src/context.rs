//! Opaque values owned by the surrounding enactment platform
//!
//! The iteration engine never looks inside a data reference or an
//! invocation context. It only carries them from the jobs it receives to
//! the jobs it emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reference to a (possibly nested) data value held by a reference service
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataRef(pub String);

impl DataRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DataRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ContextInner {
    id: String,
    properties: BTreeMap<String, String>,
}

/// Invocation context threaded unchanged through the iteration engine
///
/// Cloning is cheap; the contents are shared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationContext(Arc<ContextInner>);

impl InvocationContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::new(ContextInner {
            id: id.into(),
            properties: BTreeMap::new(),
        }))
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut inner = ContextInner {
            id: self.0.id.clone(),
            properties: self.0.properties.clone(),
        };
        inner.properties.insert(key.into(), value.into());
        Self(Arc::new(inner))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.0.properties.get(key).map(String::as_str)
    }
}
