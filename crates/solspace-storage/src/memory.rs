//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and one-shot CLI
//! runs where persistence isn't needed. It keeps decomposed spaces in a
//! BTreeMap with the same semantics as the SQLite backend.

use std::collections::BTreeMap;

use solspace_core::SolutionSpace;

use crate::convert::{decompose, recompose, DecomposedSpace};
use crate::error::StorageError;
use crate::traits::GraphStore;
use crate::types::{GraphId, GraphKey, GraphSummary};

/// Data stored for a single graph in the in-memory backend.
#[derive(Debug, Clone)]
struct StoredGraph {
    key: GraphKey,
    /// `None` until the first `save_space`.
    space: Option<DecomposedSpace>,
}

/// In-memory implementation of [`GraphStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    graphs: BTreeMap<GraphId, StoredGraph>,
    next_graph_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            graphs: BTreeMap::new(),
            next_graph_id: 1,
        }
    }

    fn get_graph(&self, id: GraphId) -> Result<&StoredGraph, StorageError> {
        self.graphs.get(&id).ok_or(StorageError::GraphNotFound(id.0))
    }

    fn get_graph_mut(&mut self, id: GraphId) -> Result<&mut StoredGraph, StorageError> {
        self.graphs
            .get_mut(&id)
            .ok_or(StorageError::GraphNotFound(id.0))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for InMemoryStore {
    fn create_graph(&mut self, key: &GraphKey) -> Result<GraphId, StorageError> {
        if self.find_graph(key)?.is_some() {
            return Err(StorageError::DuplicateGraph {
                task: key.task.clone(),
                language: key.language,
            });
        }
        let id = GraphId(self.next_graph_id);
        self.next_graph_id += 1;
        self.graphs.insert(
            id,
            StoredGraph {
                key: key.clone(),
                space: None,
            },
        );
        Ok(id)
    }

    fn find_graph(&self, key: &GraphKey) -> Result<Option<GraphId>, StorageError> {
        Ok(self
            .graphs
            .iter()
            .find(|(_, stored)| stored.key == *key)
            .map(|(&id, _)| id))
    }

    fn save_space(&mut self, id: GraphId, space: &SolutionSpace) -> Result<(), StorageError> {
        let stored = self.get_graph_mut(id)?;
        let key = GraphKey::of(space.graph.config());
        if stored.key != key {
            return Err(StorageError::ReconstructionError {
                reason: format!("cannot save a {key} space into graph {id} ({})", stored.key),
            });
        }
        stored.space = Some(decompose(space));
        Ok(())
    }

    fn load_space(&self, id: GraphId) -> Result<SolutionSpace, StorageError> {
        let stored = self.get_graph(id)?;
        let decomposed = stored.space.clone().ok_or(StorageError::EmptyGraph(id.0))?;
        recompose(decomposed)
    }

    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError> {
        self.graphs
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::GraphNotFound(id.0))
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        Ok(self
            .graphs
            .iter()
            .map(|(&id, stored)| GraphSummary {
                id,
                key: stored.key.clone(),
                vertex_count: stored.space.as_ref().map_or(0, DecomposedSpace::vertex_count),
                edge_count: stored.space.as_ref().map_or(0, |s| s.edges.len()),
            })
            .collect())
    }
}
