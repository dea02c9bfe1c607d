//! SQLite implementation of [`GraphStore`].
//!
//! [`SqliteStore`] persists solution spaces in a SQLite database with WAL
//! mode, one transaction per write, and automatic schema migrations.
//! Vertices, trees and configs are stored as JSON TEXT columns via
//! serde_json; edges and distance cells are plain integer rows.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use solspace_core::{
    EditDistance, GraphConfig, Language, SolutionSpace, SyntaxTree, Task, TreeIndex, Vertex,
    VertexId,
};

use crate::convert::{decompose, recompose, DecomposedSpace};
use crate::error::StorageError;
use crate::schema::check_sequences;
use crate::traits::GraphStore;
use crate::types::{GraphId, GraphKey, GraphSummary};

/// SQLite-backed implementation of [`GraphStore`].
///
/// Every write operation is wrapped in a transaction for atomicity.
pub struct SqliteStore {
    conn: Connection,
}

fn to_index(value: i64) -> Result<usize, StorageError> {
    usize::try_from(value).map_err(|_| StorageError::ReconstructionError {
        reason: format!("negative index {value}"),
    })
}

fn to_id(value: i64) -> Result<u32, StorageError> {
    u32::try_from(value).map_err(|_| StorageError::ReconstructionError {
        reason: format!("id {value} out of range"),
    })
}

fn parse_language(value: &str) -> Result<Language, StorageError> {
    Language::parse(value).ok_or_else(|| StorageError::ReconstructionError {
        reason: format!("unknown language {value:?}"),
    })
}

/// Graph-level columns; all but `medians_ready` are NULL before the first
/// save.
type GraphRow = (
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    bool,
);

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        info!(path, "opened graph database");
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn graph_key(&self, id: GraphId) -> Result<GraphKey, StorageError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT task, language FROM graphs WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (task, language) = row.ok_or(StorageError::GraphNotFound(id.0))?;
        Ok(GraphKey::new(Task::new(task), parse_language(&language)?))
    }

    /// Replaces all stored rows of `graph_id` within a transaction.
    /// Assumes the graph row already exists.
    fn save_decomposed(
        &mut self,
        graph_id: i64,
        decomposed: &DecomposedSpace,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;

        // Child tables first to respect foreign key ordering.
        tx.execute("DELETE FROM distance_cells WHERE graph_id = ?1", params![graph_id])?;
        tx.execute("DELETE FROM distance_trees WHERE graph_id = ?1", params![graph_id])?;
        tx.execute("DELETE FROM edges WHERE graph_id = ?1", params![graph_id])?;
        tx.execute("DELETE FROM vertices WHERE graph_id = ?1", params![graph_id])?;

        tx.execute(
            "UPDATE graphs SET config_json = ?2, start_id = ?3, end_id = ?4, empty_json = ?5, \
             next_vertex = ?6, next_variant = ?7, medians_ready = ?8 WHERE id = ?1",
            params![
                graph_id,
                serde_json::to_string(&decomposed.config)?,
                decomposed.start.0,
                decomposed.end.0,
                serde_json::to_string(&decomposed.empty)?,
                decomposed.next_ids.0,
                decomposed.next_ids.1,
                decomposed.medians_ready,
            ],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO vertices (graph_id, vertex_id, seq, kind, rate, vertex_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (seq, vertex) in decomposed.vertices.iter().enumerate() {
                stmt.execute(params![
                    graph_id,
                    vertex.id().0,
                    seq as i64,
                    vertex.kind().to_string(),
                    vertex.rate(),
                    serde_json::to_string(vertex)?,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO edges (graph_id, seq, source_id, target_id) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (seq, (from, to)) in decomposed.edges.iter().enumerate() {
                stmt.execute(params![graph_id, seq as i64, from.0, to.0])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO distance_trees (graph_id, tree_index, tree_json) VALUES (?1, ?2, ?3)",
            )?;
            for (index, tree) in decomposed.trees.iter().enumerate() {
                stmt.execute(params![graph_id, index as i64, serde_json::to_string(tree)?])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO distance_cells (graph_id, row_index, col_index, total, deletes) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (row, col, distance) in &decomposed.cells {
                stmt.execute(params![
                    graph_id,
                    row.0 as i64,
                    col.0 as i64,
                    distance.total,
                    distance.deletes,
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            graph = graph_id,
            vertices = decomposed.vertices.len(),
            edges = decomposed.edges.len(),
            cells = decomposed.cells.len(),
            "saved solution space"
        );
        Ok(())
    }

    /// Loads all stored rows of `graph_id`.
    fn load_decomposed(&self, graph_id: i64) -> Result<DecomposedSpace, StorageError> {
        let row: GraphRow = self.conn.query_row(
            "SELECT config_json, start_id, end_id, empty_json, next_vertex, next_variant, \
             medians_ready FROM graphs WHERE id = ?1",
            params![graph_id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            },
        )?;
        let (
            Some(config_json),
            Some(start),
            Some(end),
            Some(empty_json),
            Some(next_vertex),
            Some(next_variant),
            medians_ready,
        ) = row
        else {
            return Err(StorageError::EmptyGraph(graph_id));
        };
        check_sequences(&self.conn, graph_id)?;
        let config: GraphConfig = serde_json::from_str(&config_json)?;
        let empty: Vertex = serde_json::from_str(&empty_json)?;

        let vertices = {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT vertex_json FROM vertices WHERE graph_id = ?1 ORDER BY seq")?;
            let rows = stmt.query_map(params![graph_id], |row| row.get::<_, String>(0))?;
            let mut vertices = Vec::new();
            for json in rows {
                vertices.push(serde_json::from_str::<Vertex>(&json?)?);
            }
            vertices
        };

        let edges = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT source_id, target_id FROM edges WHERE graph_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt.query_map(params![graph_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut edges = Vec::new();
            for row in rows {
                let (from, to) = row?;
                edges.push((VertexId(to_id(from)?), VertexId(to_id(to)?)));
            }
            edges
        };

        let trees = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT tree_index, tree_json FROM distance_trees WHERE graph_id = ?1 \
                 ORDER BY tree_index",
            )?;
            let rows = stmt.query_map(params![graph_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut trees = Vec::new();
            for row in rows {
                let (index, json) = row?;
                if to_index(index)? != trees.len() {
                    return Err(StorageError::ReconstructionError {
                        reason: format!("distance tree {index} stored out of order"),
                    });
                }
                trees.push(serde_json::from_str::<SyntaxTree>(&json)?);
            }
            trees
        };

        let cells = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT row_index, col_index, total, deletes FROM distance_cells \
                 WHERE graph_id = ?1 ORDER BY row_index, col_index",
            )?;
            let rows = stmt.query_map(params![graph_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })?;
            let mut cells = Vec::new();
            for row in rows {
                let (r, c, total, deletes) = row?;
                cells.push((
                    TreeIndex(to_index(r)?),
                    TreeIndex(to_index(c)?),
                    EditDistance { total, deletes },
                ));
            }
            cells
        };

        Ok(DecomposedSpace {
            config,
            start: VertexId(to_id(start)?),
            end: VertexId(to_id(end)?),
            empty,
            next_ids: (to_id(next_vertex)?, to_id(next_variant)?),
            medians_ready,
            vertices,
            edges,
            trees,
            cells,
        })
    }
}

impl GraphStore for SqliteStore {
    fn create_graph(&mut self, key: &GraphKey) -> Result<GraphId, StorageError> {
        if self.find_graph(key)?.is_some() {
            return Err(StorageError::DuplicateGraph {
                task: key.task.clone(),
                language: key.language,
            });
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO graphs (task, language) VALUES (?1, ?2)",
            params![key.task.as_str(), key.language.as_str()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        info!(graph = id, key = %key, "created graph");
        Ok(GraphId(id))
    }

    fn find_graph(&self, key: &GraphKey) -> Result<Option<GraphId>, StorageError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM graphs WHERE task = ?1 AND language = ?2",
                params![key.task.as_str(), key.language.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(GraphId))
    }

    fn save_space(&mut self, id: GraphId, space: &SolutionSpace) -> Result<(), StorageError> {
        let stored = self.graph_key(id)?;
        let key = GraphKey::of(space.graph.config());
        if stored != key {
            return Err(StorageError::ReconstructionError {
                reason: format!("cannot save a {key} space into graph {id} ({stored})"),
            });
        }
        let decomposed = decompose(space);
        self.save_decomposed(id.0, &decomposed)
    }

    fn load_space(&self, id: GraphId) -> Result<SolutionSpace, StorageError> {
        self.graph_key(id)?;
        let decomposed = self.load_decomposed(id.0)?;
        recompose(decomposed)
    }

    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError> {
        self.graph_key(id)?;
        let tx = self.conn.transaction()?;
        // CASCADE removes vertices, edges, trees and cells.
        tx.execute("DELETE FROM graphs WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        info!(graph = id.0, "deleted graph");
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT g.id, g.task, g.language, \
             (SELECT COUNT(*) FROM vertices v WHERE v.graph_id = g.id AND v.kind = 'intermediate'), \
             (SELECT COUNT(*) FROM edges e WHERE e.graph_id = g.id) \
             FROM graphs g ORDER BY g.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut result = Vec::new();
        for row in rows {
            let (id, task, language, vertex_count, edge_count) = row?;
            result.push(GraphSummary {
                id: GraphId(id),
                key: GraphKey::new(Task::new(task), parse_language(&language)?),
                vertex_count: to_index(vertex_count)?,
                edge_count: to_index(edge_count)?,
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solspace_core::line::{LineDiff, LineParser};
    use solspace_core::{Code, CodeInfo, Profile, TreeParser, User, CORRECT_CODE, FULL_SOLUTION};

    fn code(source: &str, rate: f64) -> Code {
        let parsed = LineParser::default().parse(source).unwrap();
        Code::new(parsed.canonical, parsed.anonymized, rate, Language::Python).unwrap()
    }

    fn build_space(task: &str) -> SolutionSpace {
        let config = GraphConfig::new(Task::new(task), Language::Python);
        let mut space = SolutionSpace::new(config, &LineParser::default()).unwrap();
        let user = User::with_profile(
            "u1",
            Profile {
                age: Some(17),
                experience: None,
            },
        );
        space
            .add_code_info_chain(vec![
                (code("a = int(input())", CORRECT_CODE), CodeInfo::new(user.clone())),
                (code("a = int(input())\nprint(a)", FULL_SOLUTION), CodeInfo::new(user)),
            ])
            .unwrap();
        space.graph.find_all_medians();
        let trees: Vec<SyntaxTree> = space.distances.trees().cloned().collect();
        space.distances.distance(&trees[1], &trees[2], &LineDiff).unwrap();
        space
    }

    fn traversal_ids(space: &SolutionSpace) -> Vec<VertexId> {
        space.graph.get_traversal().iter().map(|v| v.id()).collect()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let space = build_space("pies");
        let id = store.save_or_create(&space).unwrap();

        let loaded = store.load_space(id).unwrap();
        assert_eq!(traversal_ids(&loaded), traversal_ids(&space));
        assert_eq!(loaded.graph.edges(), space.graph.edges());
        assert_eq!(loaded.graph.ids(), space.graph.ids());
        assert_eq!(loaded.distances.cells(), space.distances.cells());
        assert_eq!(loaded.graph.config(), space.graph.config());

        let goal = loaded.graph.goals()[0];
        assert_eq!(goal.age_median().unwrap(), Some(17.0));
    }

    #[test]
    fn test_resave_overwrites() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut space = build_space("pies");
        let id = store.save_or_create(&space).unwrap();

        space
            .find_or_create_vertex(Some(code("print(5)", FULL_SOLUTION)), Some(CodeInfo::new(User::new("u2"))))
            .unwrap();
        store.save_space(id, &space).unwrap();

        let loaded = store.load_space(id).unwrap();
        assert_eq!(loaded.graph.vertex_count(), space.graph.vertex_count());
        assert_eq!(loaded.graph.goals().len(), 2);
        assert_eq!(store.list_graphs().unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graphs.db");
        let path = path.to_str().unwrap();
        let space = build_space("pies");
        {
            let mut store = SqliteStore::new(path).unwrap();
            store.save_or_create(&space).unwrap();
        }
        let store = SqliteStore::new(path).unwrap();
        let key = GraphKey::new(Task::new("pies"), Language::Python);
        let loaded = store.load_by_key(&key).unwrap().unwrap();
        assert_eq!(traversal_ids(&loaded), traversal_ids(&space));
    }

    #[test]
    fn test_list_counts_intermediate_vertices() {
        let mut store = SqliteStore::in_memory().unwrap();
        let empty = store
            .create_graph(&GraphKey::new(Task::new("zero"), Language::Java))
            .unwrap();
        store.save_or_create(&build_space("pies")).unwrap();

        let list = store.list_graphs().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, empty);
        assert_eq!(list[0].vertex_count, 0);
        assert_eq!(list[0].key.language, Language::Java);
        assert_eq!(list[1].vertex_count, 2);
        assert_eq!(list[1].edge_count, 3);
    }

    #[test]
    fn test_unsaved_graph_cannot_be_loaded() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store
            .create_graph(&GraphKey::new(Task::new("zero"), Language::Python))
            .unwrap();
        assert!(matches!(store.load_space(id), Err(StorageError::EmptyGraph(_))));
    }

    #[test]
    fn test_duplicate_graph_rejected() {
        let mut store = SqliteStore::in_memory().unwrap();
        let key = GraphKey::new(Task::new("pies"), Language::Python);
        store.create_graph(&key).unwrap();
        assert!(matches!(
            store.create_graph(&key),
            Err(StorageError::DuplicateGraph { .. })
        ));
    }

    #[test]
    fn test_delete_cascades() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.save_or_create(&build_space("pies")).unwrap();
        store.delete_graph(id).unwrap();

        assert!(matches!(store.load_space(id), Err(StorageError::GraphNotFound(_))));
        let orphans: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM vertices", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        let cells: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM distance_cells", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cells, 0);
    }

    #[test]
    fn test_missing_edge_row_is_detected_on_load() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.save_or_create(&build_space("pies")).unwrap();
        store
            .conn
            .execute("DELETE FROM edges WHERE graph_id = ?1 AND seq = 0", params![id.0])
            .unwrap();

        let err = store.load_space(id).unwrap_err();
        assert!(matches!(err, StorageError::ReconstructionError { .. }));
    }
}
