//! The [`GraphStore`] trait defining the storage contract for solution
//! spaces.
//!
//! A store holds one graph per [`GraphKey`]. Saving is a whole-space
//! overwrite: vertices, edges in insertion order, the detached empty vertex,
//! id counters and the distance cache are written together, so a reload
//! reproduces traversal order, ids and cached distances exactly.

use solspace_core::SolutionSpace;

use crate::error::StorageError;
use crate::types::{GraphId, GraphKey, GraphSummary};

/// The storage contract for solution spaces.
///
/// The trait is synchronous. Callers serving hints from several threads
/// load a space once and share it behind their own lock.
pub trait GraphStore {
    /// Registers an empty graph for `key`. Fails with
    /// [`StorageError::DuplicateGraph`] if one already exists.
    fn create_graph(&mut self, key: &GraphKey) -> Result<GraphId, StorageError>;

    /// Looks up the graph registered for `key`.
    fn find_graph(&self, key: &GraphKey) -> Result<Option<GraphId>, StorageError>;

    /// Overwrites everything stored for `id` with `space`.
    fn save_space(&mut self, id: GraphId, space: &SolutionSpace) -> Result<(), StorageError>;

    /// Rebuilds the solution space stored for `id`.
    fn load_space(&self, id: GraphId) -> Result<SolutionSpace, StorageError>;

    /// Deletes a graph and all its associated data.
    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError>;

    /// Lists all stored graphs ordered by id.
    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError>;

    // -------------------------------------------------------------------
    // Convenience methods
    // -------------------------------------------------------------------

    /// Saves `space` under its own (task, language) key, creating the graph
    /// row when needed.
    fn save_or_create(&mut self, space: &SolutionSpace) -> Result<GraphId, StorageError> {
        let key = GraphKey::of(space.graph.config());
        let id = match self.find_graph(&key)? {
            Some(id) => id,
            None => self.create_graph(&key)?,
        };
        self.save_space(id, space)?;
        Ok(id)
    }

    /// Loads the space stored for `key`, if any.
    fn load_by_key(&self, key: &GraphKey) -> Result<Option<SolutionSpace>, StorageError> {
        match self.find_graph(key)? {
            Some(id) => self.load_space(id).map(Some),
            None => Ok(None),
        }
    }
}
