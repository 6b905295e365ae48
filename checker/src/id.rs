// id.rs — Node and edge identifiers
//
// Ids are owned by the graph-editing side and arrive as opaque strings. They
// order lexicographically, which is what gives result maps a stable iteration
// order. `EdgeIdAllocator` hands out `e0, e1, …` for graphs built from sketches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node (block instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Identifier of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        EdgeId(s.to_string())
    }
}

/// Allocator for edge ids. Monotonically increasing in allocation order, so a
/// sketch always lowers to the same ids.
#[derive(Debug, Default)]
pub struct EdgeIdAllocator {
    next: u32,
}

impl EdgeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> EdgeId {
        let id = EdgeId(format!("e{}", self.next));
        self.next += 1;
        id
    }
}
