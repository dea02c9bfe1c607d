//! Core error types for solspace-core.
//!
//! Uses `thiserror` for structured, matchable variants. None of these are
//! retried internally: graph operations are deterministic given their inputs.

use thiserror::Error;

use crate::id::{VariantId, VertexId};

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Parser,
    EditDistance,
    DiffApplicator,
    Renderer,
    TestRunner,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Collaborator::Parser => "parser",
            Collaborator::EditDistance => "edit distance",
            Collaborator::DiffApplicator => "diff applicator",
            Collaborator::Renderer => "renderer",
            Collaborator::TestRunner => "test runner",
        };
        f.write_str(name)
    }
}

/// Errors produced by the solspace-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Absent or malformed code handed to a graph operation.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A new variant's rate disagrees with the rate already established for
    /// its canonical form. Points at an upstream scoring bug.
    #[error("inconsistent rate for vertex {vertex:?}: established {established}, new variant has {new}")]
    InconsistentRate {
        vertex: Option<VertexId>,
        established: f64,
        new: f64,
    },

    /// A median was requested before `find_all_medians` ran.
    #[error("median not ready for vertex {vertex:?} / variant {variant:?}; call find_all_medians first")]
    MedianNotReady {
        vertex: Option<VertexId>,
        variant: Option<VariantId>,
    },

    /// A vertex id is not part of this graph.
    #[error("vertex not found: VertexId({id})", id = id.0)]
    VertexNotFound { id: VertexId },

    /// An external collaborator call failed; propagated unchanged.
    #[error("{collaborator} failed: {reason}")]
    Collaborator {
        collaborator: Collaborator,
        reason: String,
    },

    /// Reading a serialized variant file back failed.
    #[error("code file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn collaborator(collaborator: Collaborator, reason: impl Into<String>) -> Self {
        CoreError::Collaborator {
            collaborator,
            reason: reason.into(),
        }
    }
}
