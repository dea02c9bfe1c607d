//! Storage error types for solspace-storage.
//!
//! [`StorageError`] covers SQLite and migration failures, missing or
//! duplicate graphs, malformed history files and failures to rebuild a
//! solution space from stored rows.

use std::path::PathBuf;

use thiserror::Error;

use solspace_core::{CoreError, Language, Task};

/// Errors produced by storage and ingestion.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    /// A graph with the given ID was not found.
    #[error("graph not found: {0}")]
    GraphNotFound(i64),

    /// A graph for this (task, language) pair already exists.
    #[error("graph already exists for task {task} ({language})")]
    DuplicateGraph { task: Task, language: Language },

    /// The graph row exists but no solution space was saved into it yet.
    #[error("graph {0} has no saved solution space")]
    EmptyGraph(i64),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A history file parsed as JSON but does not describe a learner history.
    #[error("malformed history file {path}: {reason}")]
    History { path: PathBuf, reason: String },

    /// Failed to reconstruct a SolutionSpace from stored data.
    #[error("reconstruction error: {reason}")]
    ReconstructionError { reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
