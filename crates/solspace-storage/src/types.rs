//! Storage-layer types for graph identity and metadata.
//!
//! [`GraphId`] lives here rather than in solspace-core because a graph only
//! gains an ID when persisted. A store keeps at most one graph per
//! [`GraphKey`].

use std::fmt;

use serde::{Deserialize, Serialize};

use solspace_core::{GraphConfig, Language, Task};

/// Unique identifier for a stored graph. Aligns with SQLite's
/// `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphId(pub i64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphId({})", self.0)
    }
}

/// The (task, language) pair a graph is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphKey {
    pub task: Task,
    pub language: Language,
}

impl GraphKey {
    pub fn new(task: Task, language: Language) -> Self {
        GraphKey { task, language }
    }

    pub fn of(config: &GraphConfig) -> Self {
        GraphKey::new(config.task.clone(), config.language)
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task, self.language)
    }
}

/// Summary of a stored graph (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: GraphId,
    pub key: GraphKey,
    /// Intermediate vertices; 0 until a space has been saved.
    pub vertex_count: usize,
    pub edge_count: usize,
}
