//! Errors raised while choosing and synthesizing a hint.

use thiserror::Error;

use solspace_core::{CoreError, Task, VertexId};

/// Errors produced by the solspace-hint crate.
///
/// Every variant means "no hint available" for the request that raised it;
/// nothing here is retried.
#[derive(Debug, Error)]
pub enum HintError {
    /// The graph has no full-solution vertex to aim for.
    #[error("no goal available for task {task}: the solution graph has no full solution yet")]
    NoGoalAvailable { task: Task },

    /// Two candidates measured against different learner vertices were
    /// compared.
    #[error("cannot compare candidates measured against learner {left} and learner {right}")]
    ComparisonTypeError { left: VertexId, right: VertexId },

    #[error("invalid hint config: {0}")]
    InvalidConfig(String),

    #[error("failed to read hint config: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse hint config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A graph or collaborator failure, propagated unchanged.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("hint handler lock poisoned")]
    LockPoisoned,
}
