//! Stable ID newtypes for solution-space entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, so a `VertexId` cannot be
//! used where a `VariantId` is expected. Ids are handed out by an
//! [`IdAllocator`] owned by the graph; nothing here is process-global.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable vertex identifier, unique within one solution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub u32);

/// Identifier of one anonymized variant, unique within one solution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantId(pub u32);

/// Row/column of a canonical tree in the distance cache (insertion order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeIndex(pub usize);

/// Learner identity. Two code infos belong to the same learner iff their
/// user ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TreeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

/// Monotonic id counters for one graph.
///
/// Reset only by constructing a new allocator (i.e. a new graph). Restored
/// verbatim when a graph is reloaded from storage so ids are never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next_vertex: u32,
    next_variant: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an allocator from persisted counter values.
    pub fn from_parts(next_vertex: u32, next_variant: u32) -> Self {
        IdAllocator {
            next_vertex,
            next_variant,
        }
    }

    pub fn next_vertex_id(&mut self) -> VertexId {
        let id = VertexId(self.next_vertex);
        self.next_vertex += 1;
        id
    }

    pub fn next_variant_id(&mut self) -> VariantId {
        let id = VariantId(self.next_variant);
        self.next_variant += 1;
        id
    }

    /// Counter values as `(next_vertex, next_variant)`.
    pub fn counters(&self) -> (u32, u32) {
        (self.next_vertex, self.next_variant)
    }
}
