//! Storage and batch construction for solution spaces.
//!
//! Provides the [`GraphStore`] trait defining the storage contract that all
//! backends implement, the [`InMemoryStore`] and [`SqliteStore`] backends,
//! and [`construct_solution_graph`], which builds a space from learner
//! history files.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: GraphId, GraphKey, GraphSummary storage-layer types
//! - [`traits`]: GraphStore trait definition
//! - [`convert`]: SolutionSpace decompose/recompose functions
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migration setup and `seq` checks for the SQLite backend
//! - [`sqlite`]: SqliteStore implementation
//! - [`ingest`]: history files and construct_solution_graph

pub mod convert;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use convert::{decompose, recompose, DecomposedSpace};
pub use error::StorageError;
pub use ingest::{construct_solution_graph, history_files_in, HistoryFile, HistoryUser, Submission};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::GraphStore;
pub use types::{GraphId, GraphKey, GraphSummary};
