//! Hint handler: turns a learner's source into a recommended next state.
//!
//! [`SharedHintHandler`] wraps a handler in `Arc<Mutex<>>` so hint requests
//! from several threads are serialised. Each request holds the lock for its
//! whole duration, which keeps vertex creation and distance-cache growth
//! atomic.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use solspace_core::{
    Code, CodeInfo, Collaborator, Collaborators, CoreError, SolutionSpace, SyntaxTree, Vertex,
    VertexId,
};

use crate::config::HintConfig;
use crate::error::HintError;
use crate::finder::{FinderContext, PathFinder, Route};

/// A recommendation for one learner request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    /// The learner's code after the minimal edits towards `target`.
    pub recommended_code: String,
    pub target: VertexId,
    pub goal: VertexId,
    pub route: Route,
}

/// Serves hints from one solution space.
#[derive(Debug)]
pub struct HintHandler {
    space: SolutionSpace,
    collaborators: Collaborators,
    config: HintConfig,
    finder: Box<dyn PathFinder>,
}

impl HintHandler {
    /// Computes medians if the graph has not done so yet, and picks the path
    /// finder named by `config.strategy`.
    pub fn new(mut space: SolutionSpace, collaborators: Collaborators, config: HintConfig) -> Self {
        if !space.graph.medians_ready() {
            space.graph.find_all_medians();
        }
        let finder = config.strategy.path_finder();
        HintHandler {
            space,
            collaborators,
            config,
            finder,
        }
    }

    pub fn with_path_finder(mut self, finder: Box<dyn PathFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn space(&self) -> &SolutionSpace {
        &self.space
    }

    pub fn config(&self) -> &HintConfig {
        &self.config
    }

    pub fn path_finder(&self) -> &dyn PathFinder {
        self.finder.as_ref()
    }

    pub fn into_space(self) -> SolutionSpace {
        self.space
    }

    /// Recommends the next code state for `source`. Without a `rate` the
    /// source is scored through the test runner.
    ///
    /// The learner's canonical tree enters the distance cache the first time
    /// a distance to it is measured, so the matrix gains one row and column
    /// per distinct learner canonical form, vertex or not. Repeated
    /// submissions of the same form reuse the row.
    pub fn get_hint(
        &mut self,
        source: &str,
        rate: Option<f64>,
        code_info: CodeInfo,
    ) -> Result<Hint, HintError> {
        let code = Code::from_source(
            source,
            rate,
            self.space.graph.task(),
            self.space.graph.language(),
            self.collaborators.parser.as_ref(),
            self.collaborators.runner.as_deref(),
        )?;
        let recorded = self.config.record_learner_code.then(|| (code.clone(), code_info.clone()));

        let learner = self.space.graph.detached_vertex(code, Some(code_info));
        info!(
            learner = %learner.id(),
            finder = self.finder.name(),
            "finding the next code state"
        );

        let mut ctx = FinderContext {
            graph: &self.space.graph,
            distances: &mut self.space.distances,
            collaborators: &self.collaborators,
            config: &self.config,
        };
        let decision = self.finder.find_next_vertex(&mut ctx, &learner)?;
        let recommended_code = synthesize(&learner, decision.target, &self.collaborators)?;
        let hint = Hint {
            recommended_code,
            target: decision.target.id(),
            goal: decision.goal.id(),
            route: decision.route,
        };
        info!(target = %hint.target, route = %hint.route, "next vertex chosen");

        if let Some((code, code_info)) = recorded {
            self.space.find_or_create_vertex(Some(code), Some(code_info))?;
        }
        Ok(hint)
    }
}

fn learner_tree(learner: &Vertex) -> Result<&SyntaxTree, HintError> {
    learner
        .code()
        .and_then(|c| c.variants().first())
        .map(|v| v.tree())
        .ok_or_else(|| CoreError::invalid_input("learner vertex has no code").into())
}

/// Applies the minimal edits from the learner's anonymized tree to the
/// closest variant of `target` and renders the result.
fn synthesize(learner: &Vertex, target: &Vertex, collaborators: &Collaborators) -> Result<String, HintError> {
    let from = learner_tree(learner)?;
    let variants = target.code().map(|c| c.variants()).unwrap_or_default();

    let mut best: Option<(u32, &SyntaxTree)> = None;
    for variant in variants {
        let d = collaborators.diff.edit_distance(from, variant.tree())?;
        if best.map_or(true, |(total, _)| d.total < total) {
            best = Some((d.total, variant.tree()));
        }
    }
    let (_, to) = best.ok_or_else(|| {
        CoreError::collaborator(
            Collaborator::DiffApplicator,
            format!("target vertex {} has no variant to move towards", target.id()),
        )
    })?;

    let edited = collaborators.applicator.apply_minimal_edits(from, to)?;
    Ok(collaborators.renderer.render(&edited)?)
}

/// A hint handler shareable across threads.
#[derive(Debug, Clone)]
pub struct SharedHintHandler {
    inner: Arc<Mutex<HintHandler>>,
}

impl SharedHintHandler {
    pub fn new(handler: HintHandler) -> Self {
        SharedHintHandler {
            inner: Arc::new(Mutex::new(handler)),
        }
    }

    pub fn get_hint(
        &self,
        source: &str,
        rate: Option<f64>,
        code_info: CodeInfo,
    ) -> Result<Hint, HintError> {
        let mut handler = self.inner.lock().map_err(|_| HintError::LockPoisoned)?;
        handler.get_hint(source, rate, code_info)
    }

    /// Runs `f` with exclusive access to the handler.
    pub fn with_handler<R>(&self, f: impl FnOnce(&mut HintHandler) -> R) -> Result<R, HintError> {
        let mut handler = self.inner.lock().map_err(|_| HintError::LockPoisoned)?;
        Ok(f(&mut handler))
    }
}
