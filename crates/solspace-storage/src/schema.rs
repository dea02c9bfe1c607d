//! SQL schema and migration setup for the SQLite backend.
//!
//! Uses `rusqlite_migration` to manage schema migrations via SQLite's
//! `user_version` pragma. Migrations are embedded at compile time via
//! `include_str!`.
//!
//! Vertex and edge rows carry a per-graph `seq`. A graph is rebuilt by
//! replaying rows in `seq` order, which fixes vertex creation order and the
//! child visiting order of every vertex, so [`check_sequences`] rejects
//! graphs whose sequence has gaps.

use rusqlite::{params, Connection};
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

/// All schema migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial_schema.sql"))])
}

/// Opens (or creates) a SQLite database at `path` with WAL mode, foreign keys,
/// and all pending migrations applied.
pub fn open_database(path: &str) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with foreign keys and all pending
/// migrations applied.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

fn configure_and_migrate(conn: &mut Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Off by default in SQLite.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    Ok(())
}

/// Tables whose `seq` runs 0, 1, 2, ... within each graph.
const SEQUENCED_TABLES: [&str; 2] = ["vertices", "edges"];

/// Fails when the vertex or edge sequence of `graph_id` is not dense.
pub fn check_sequences(conn: &Connection, graph_id: i64) -> Result<(), StorageError> {
    for table in SEQUENCED_TABLES {
        let (count, min, max): (i64, Option<i64>, Option<i64>) = conn.query_row(
            &format!("SELECT COUNT(*), MIN(seq), MAX(seq) FROM {table} WHERE graph_id = ?1"),
            params![graph_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let dense = match (min, max) {
            (Some(min), Some(max)) => min == 0 && max == count - 1,
            _ => count == 0,
        };
        if !dense {
            return Err(StorageError::ReconstructionError {
                reason: format!(
                    "{table} of graph {graph_id}: {count} rows with seq {min:?}..={max:?}"
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_vertices(conn: &Connection, seqs: &[(i64, i64)]) -> i64 {
        conn.execute(
            "INSERT INTO graphs (task, language) VALUES ('pies', 'python')",
            [],
        )
        .unwrap();
        let graph_id = conn.last_insert_rowid();
        for (vertex_id, seq) in seqs {
            conn.execute(
                "INSERT INTO vertices (graph_id, vertex_id, seq, kind, vertex_json) \
                 VALUES (?1, ?2, ?3, 'intermediate', '{}')",
                params![graph_id, vertex_id, seq],
            )
            .unwrap();
        }
        graph_id
    }

    fn add_edge(conn: &Connection, graph_id: i64, seq: i64, from: i64, to: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO edges (graph_id, seq, source_id, target_id) VALUES (?1, ?2, ?3, ?4)",
            params![graph_id, seq, from, to],
        )
    }

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let conn = open_in_memory().unwrap();
        let on: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(on);
    }

    #[test]
    fn dense_sequences_pass() {
        let conn = open_in_memory().unwrap();
        let graph_id = graph_with_vertices(&conn, &[(0, 0), (1, 1), (2, 2)]);
        add_edge(&conn, graph_id, 0, 0, 2).unwrap();
        add_edge(&conn, graph_id, 1, 0, 1).unwrap();
        check_sequences(&conn, graph_id).unwrap();

        let empty = graph_with_vertices(&conn, &[]);
        check_sequences(&conn, empty).unwrap();
    }

    #[test]
    fn gaps_in_vertex_or_edge_sequence_are_rejected() {
        let conn = open_in_memory().unwrap();
        let graph_id = graph_with_vertices(&conn, &[(0, 0), (1, 2)]);
        let err = check_sequences(&conn, graph_id).unwrap_err();
        assert!(err.to_string().contains("vertices"));

        let graph_id = graph_with_vertices(&conn, &[(0, 0), (1, 1), (2, 2)]);
        add_edge(&conn, graph_id, 1, 0, 1).unwrap();
        let err = check_sequences(&conn, graph_id).unwrap_err();
        assert!(err.to_string().contains("edges"));
    }

    #[test]
    fn edges_must_be_unique_and_between_stored_vertices() {
        let conn = open_in_memory().unwrap();
        let graph_id = graph_with_vertices(&conn, &[(0, 0), (1, 1)]);
        add_edge(&conn, graph_id, 0, 0, 1).unwrap();
        assert!(add_edge(&conn, graph_id, 1, 0, 1).is_err());
        assert!(add_edge(&conn, graph_id, 1, 0, 7).is_err());
    }
}
