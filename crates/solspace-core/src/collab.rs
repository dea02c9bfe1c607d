//! Interfaces of the external collaborators the core consumes.
//!
//! Parsing, tree edit distance, edit application, rendering and scoring all
//! live outside this crate. Their failures surface as
//! [`CoreError::Collaborator`] and are never masked by the core.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::code::Task;
use crate::error::CoreError;
use crate::line::{LineDiff, LineParser, LineRenderer};
use crate::tree::SyntaxTree;

/// Both normalised forms of one piece of source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCode {
    pub canonical: SyntaxTree,
    pub anonymized: SyntaxTree,
}

/// Deterministic source-to-tree conversion for the exercise's language.
pub trait TreeParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<ParsedCode, CoreError>;
}

/// Result of one directed tree edit-distance computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDistance {
    /// Number of edit actions turning the source tree into the target.
    pub total: u32,
    /// How many of those actions are deletions.
    pub deletes: u32,
}

impl EditDistance {
    pub const ZERO: EditDistance = EditDistance {
        total: 0,
        deletes: 0,
    };

    /// Fraction of actions that are deletions; 0 for an empty script.
    pub fn delete_share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.deletes) / f64::from(self.total)
        }
    }
}

/// Tree edit-distance tool. May be asymmetric: `edit_distance(a, b)` and
/// `edit_distance(b, a)` can differ.
pub trait TreeDiff: Send + Sync {
    fn edit_distance(&self, from: &SyntaxTree, to: &SyntaxTree) -> Result<EditDistance, CoreError>;
}

/// Applies the minimal edit script between two trees.
pub trait DiffApplicator: Send + Sync {
    fn apply_minimal_edits(&self, from: &SyntaxTree, to: &SyntaxTree)
        -> Result<SyntaxTree, CoreError>;
}

pub trait TreeRenderer: Send + Sync {
    fn render(&self, tree: &SyntaxTree) -> Result<String, CoreError>;
}

/// Sandboxed test runner assigning a rate in `[-1, 1]` to a submission.
pub trait TestRunner: Send + Sync {
    fn score(&self, source: &str, task: &Task) -> Result<f64, CoreError>;
}

/// The full set of collaborators a solution space works with.
#[derive(Clone)]
pub struct Collaborators {
    pub parser: Arc<dyn TreeParser>,
    pub diff: Arc<dyn TreeDiff>,
    pub applicator: Arc<dyn DiffApplicator>,
    pub renderer: Arc<dyn TreeRenderer>,
    /// Optional: without a runner every code state needs an explicit rate.
    pub runner: Option<Arc<dyn TestRunner>>,
}

impl Collaborators {
    /// Line-oriented reference collaborators (see [`crate::line`]).
    pub fn line_based() -> Self {
        let diff = Arc::new(LineDiff);
        Collaborators {
            parser: Arc::new(LineParser::default()),
            diff: diff.clone(),
            applicator: diff,
            renderer: Arc::new(LineRenderer),
            runner: None,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn TestRunner>) -> Self {
        self.runner = Some(runner);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("runner", &self.runner.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_share_of_empty_script_is_zero() {
        assert_eq!(EditDistance::ZERO.delete_share(), 0.0);
    }

    #[test]
    fn delete_share_is_fraction_of_actions() {
        let d = EditDistance {
            total: 8,
            deletes: 2,
        };
        assert!((d.delete_share() - 0.25).abs() < 1e-12);
    }
}
