//! Path finders: pick the next code state for a learner.
//!
//! Each request runs the same three steps:
//!
//! 1. **Goal**: the best-ranked parent of `end`.
//! 2. **Anchor**: the best-ranked graph vertex among a strategy-specific
//!    candidate set.
//! 3. **Routing**: go to the goal directly when most of the way is done,
//!    when the anchor is too far off the direct path, or (V2) when the anchor
//!    would lower the learner's rate. Otherwise recommend the anchor.
//!
//! Finders are stateless; everything lives in the [`FinderContext`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use solspace_core::{Collaborators, DistanceCache, EditDistance, SolutionGraph, Vertex, VertexId, VertexKind};

use crate::config::HintConfig;
use crate::error::HintError;
use crate::measured::{rank, MeasuredVertex};

/// How the recommended vertex was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// The recommendation is an intermediate graph vertex.
    ThroughGraph,
    /// The recommendation is the goal itself.
    DirectToGoal,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::ThroughGraph => f.write_str("through graph"),
            Route::DirectToGoal => f.write_str("direct to goal"),
        }
    }
}

/// Outcome of one path-finding request.
#[derive(Debug, Clone, Copy)]
pub struct Decision<'g> {
    pub target: &'g Vertex,
    pub goal: &'g Vertex,
    pub route: Route,
}

/// Borrowed state a path finder works on.
///
/// The graph is read-only; the distance cache grows as new pairs are
/// measured.
pub struct FinderContext<'g> {
    pub graph: &'g SolutionGraph,
    pub distances: &'g mut DistanceCache,
    pub collaborators: &'g Collaborators,
    pub config: &'g HintConfig,
}

impl<'g> FinderContext<'g> {
    /// Directed canonical-tree distance between two vertices.
    pub fn distance(&mut self, from: &Vertex, to: &Vertex) -> Result<EditDistance, HintError> {
        match (from.canonical(), to.canonical()) {
            (Some(a), Some(b)) => Ok(self
                .distances
                .distance(a, b, self.collaborators.diff.as_ref())?),
            _ => Err(solspace_core::CoreError::invalid_input(format!(
                "distance between {} and {} involves a sentinel",
                from.id(),
                to.id()
            ))
            .into()),
        }
    }

    fn diffs(&mut self, from: &Vertex, to: &Vertex) -> Result<f64, HintError> {
        Ok(f64::from(self.distance(from, to)?.total))
    }

    /// Best candidate for `learner`, or `None` when there are none.
    pub fn choose_best(
        &mut self,
        learner: &Vertex,
        candidates: &[&'g Vertex],
    ) -> Result<Option<&'g Vertex>, HintError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let users_number = self.config.users_number(self.graph.task());
        let mut measured = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            measured.push(MeasuredVertex::measure(
                learner,
                candidate,
                self.distances,
                self.collaborators.diff.as_ref(),
                &self.config.weights,
                users_number,
            )?);
        }
        let ranked = rank(measured)?;
        let ids: Vec<VertexId> = ranked.iter().map(MeasuredVertex::candidate).collect();
        debug!(candidates = ?ids, "ranked candidates");
        let best = &ranked[0];
        info!(vertex = %best.candidate(), score = best.score(), terms = %best.terms(), "best candidate");
        Ok(self.graph.vertex(best.candidate()))
    }

    /// Step 1: the best goal. Fails when the graph has no full solution.
    pub fn find_closest_goal(&mut self, learner: &Vertex) -> Result<&'g Vertex, HintError> {
        let goals = self.graph.goals();
        let ids: Vec<VertexId> = goals.iter().map(|g| g.id()).collect();
        info!(goals = ?ids, "goal candidates");
        self.choose_best(learner, &goals)?
            .ok_or_else(|| HintError::NoGoalAvailable {
                task: self.graph.task().clone(),
            })
    }

    /// Traversal without `start`.
    fn traversal(&self) -> Vec<&'g Vertex> {
        self.graph
            .get_traversal()
            .into_iter()
            .filter(|v| v.kind() == VertexKind::Intermediate)
            .collect()
    }

    /// Step 3.
    fn route(
        &mut self,
        learner: &Vertex,
        anchor: Option<&'g Vertex>,
        goal: &'g Vertex,
        guard_rate: bool,
    ) -> Result<Decision<'g>, HintError> {
        let direct = Decision {
            target: goal,
            goal,
            route: Route::DirectToGoal,
        };
        let Some(anchor) = anchor else {
            info!("no graph anchor, going directly to the goal");
            return Ok(direct);
        };

        let to_goal = self.diffs(learner, goal)?;
        let empty = self.graph.empty_vertex();
        let from_empty = self.diffs(empty, learner)?;
        if to_goal <= self.config.diffs_percent_to_go_directly * (from_empty + to_goal) {
            info!(to_goal, from_empty, "most of the path is done, going directly to the goal");
            return Ok(direct);
        }

        if guard_rate {
            let learner_rate = learner.rate().unwrap_or_default();
            let anchor_rate = anchor.rate().unwrap_or_default();
            if learner_rate > 0.0 && anchor_rate <= 0.0 {
                info!(learner_rate, anchor_rate, "anchor would lower the rate, going directly to the goal");
                return Ok(direct);
            }
        }

        let to_anchor = self.diffs(learner, anchor)?;
        if to_anchor / to_goal > self.config.distance_to_graph_threshold {
            info!(to_anchor, to_goal, "anchor is far from the direct path, going directly to the goal");
            return Ok(direct);
        }

        info!(anchor = %anchor.id(), "going through the graph");
        Ok(Decision {
            target: anchor,
            goal,
            route: Route::ThroughGraph,
        })
    }
}

/// Chooses the next vertex for a learner vertex that is not part of the
/// graph.
pub trait PathFinder: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn find_next_vertex<'g>(
        &self,
        ctx: &mut FinderContext<'g>,
        learner: &Vertex,
    ) -> Result<Decision<'g>, HintError>;
}

/// Anchors are vertices at most as far from the goal as the learner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFinderV1;

impl PathFinderV1 {
    fn find_closest_vertex_with_path<'g>(
        &self,
        ctx: &mut FinderContext<'g>,
        learner: &Vertex,
        goal: &'g Vertex,
    ) -> Result<Option<&'g Vertex>, HintError> {
        let learner_to_goal = ctx.diffs(learner, goal)?;
        let empty_canonical = ctx.graph.empty_vertex().canonical();
        let mut candidates = Vec::new();
        for vertex in ctx.traversal() {
            if vertex.canonical() == learner.canonical() || vertex.canonical() == empty_canonical {
                continue;
            }
            if ctx.diffs(vertex, goal)? <= learner_to_goal {
                candidates.push(vertex);
            }
        }
        ctx.choose_best(learner, &candidates)
    }
}

impl PathFinder for PathFinderV1 {
    fn name(&self) -> &'static str {
        "v1"
    }

    fn find_next_vertex<'g>(
        &self,
        ctx: &mut FinderContext<'g>,
        learner: &Vertex,
    ) -> Result<Decision<'g>, HintError> {
        let goal = ctx.find_closest_goal(learner)?;
        let anchor = self.find_closest_vertex_with_path(ctx, learner, goal)?;
        ctx.route(learner, anchor, goal, false)
    }
}

/// Anchors are the children of the learner's own vertex when it exists, and
/// otherwise vertices that mostly do not repeat the learner's lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFinderV2;

impl PathFinderV2 {
    /// Share of the candidate's canonical source lines that already occur
    /// in the learner's canonical source.
    fn rollback_probability(
        ctx: &FinderContext<'_>,
        learner: &Vertex,
        candidate: &Vertex,
    ) -> Result<f64, HintError> {
        let (Some(learner_tree), Some(candidate_tree)) = (learner.canonical(), candidate.canonical())
        else {
            return Ok(0.0);
        };
        let renderer = ctx.collaborators.renderer.as_ref();
        let learner_code = renderer.render(learner_tree)?;
        let candidate_code = renderer.render(candidate_tree)?;
        let lines: Vec<&str> = candidate_code.trim_matches('\n').split('\n').collect();
        let included = lines.iter().filter(|line| learner_code.contains(*line)).count();
        Ok(included as f64 / lines.len() as f64)
    }

    fn find_closest_vertex_with_path<'g>(
        &self,
        ctx: &mut FinderContext<'g>,
        learner: &Vertex,
    ) -> Result<Option<&'g Vertex>, HintError> {
        if let Some(own) = learner.canonical().and_then(|c| ctx.graph.find_vertex(c)) {
            debug!(vertex = %own.id(), "learner code is already in the graph, using its children");
            let children: Vec<&'g Vertex> = ctx
                .graph
                .children(own.id())?
                .into_iter()
                .filter(|v| v.kind() == VertexKind::Intermediate)
                .collect();
            return ctx.choose_best(learner, &children);
        }

        let mut candidates = Vec::new();
        for vertex in ctx.traversal() {
            if Self::rollback_probability(ctx, learner, vertex)? <= ctx.config.rollback_probability {
                candidates.push(vertex);
            }
        }
        ctx.choose_best(learner, &candidates)
    }
}

impl PathFinder for PathFinderV2 {
    fn name(&self) -> &'static str {
        "v2"
    }

    fn find_next_vertex<'g>(
        &self,
        ctx: &mut FinderContext<'g>,
        learner: &Vertex,
    ) -> Result<Decision<'g>, HintError> {
        let goal = ctx.find_closest_goal(learner)?;
        let anchor = self.find_closest_vertex_with_path(ctx, learner)?;
        ctx.route(learner, anchor, goal, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringWeights;
    use solspace_core::line::LineParser;
    use solspace_core::{Code, CodeInfo, GraphConfig, Language, Task, TreeParser, User, CORRECT_CODE, FULL_SOLUTION};

    const GOAL: &str = "a = int(input())\nb = int(input())\nprint(a + b)\nprint(a - b)\nprint(a * b)";

    fn code(source: &str, rate: f64) -> Code {
        let parsed = LineParser::default().parse(source).unwrap();
        Code::new(parsed.canonical, parsed.anonymized, rate, Language::Python).unwrap()
    }

    fn first_lines(n: usize) -> String {
        GOAL.lines().take(n).collect::<Vec<_>>().join("\n")
    }

    /// start -> 1 line -> 3 lines -> goal -> end
    fn graph() -> SolutionGraph {
        let mut sg = SolutionGraph::new(
            GraphConfig::new(Task::new("pies"), Language::Python),
            code("", CORRECT_CODE),
        );
        let user = User::new("u");
        sg.add_code_info_chain(vec![
            (code(&first_lines(1), CORRECT_CODE), CodeInfo::new(user.clone())),
            (code(&first_lines(3), 0.5), CodeInfo::new(user.clone())),
            (code(GOAL, FULL_SOLUTION), CodeInfo::new(user)),
        ])
        .unwrap();
        sg.find_all_medians();
        sg
    }

    fn decide<'g>(
        finder: &dyn PathFinder,
        sg: &'g SolutionGraph,
        distances: &'g mut DistanceCache,
        collaborators: &'g Collaborators,
        config: &'g HintConfig,
        learner: &Vertex,
    ) -> Result<Decision<'g>, HintError> {
        let mut ctx = FinderContext {
            graph: sg,
            distances,
            collaborators,
            config,
        };
        finder.find_next_vertex(&mut ctx, learner)
    }

    #[test]
    fn learner_almost_done_goes_directly_to_goal() {
        let mut sg = graph();
        let learner = sg.detached_vertex(code(&first_lines(4), 0.5), None);
        let collaborators = Collaborators::line_based();
        let config = HintConfig::default();
        for finder in [&PathFinderV1 as &dyn PathFinder, &PathFinderV2] {
            let mut distances = DistanceCache::new();
            let decision = decide(finder, &sg, &mut distances, &collaborators, &config, &learner).unwrap();
            assert_eq!(decision.route, Route::DirectToGoal, "{}", finder.name());
            assert!(decision.target.is_full());
        }
    }

    #[test]
    fn learner_at_the_beginning_goes_through_graph() {
        let mut sg = graph();
        let learner = sg.detached_vertex(code(&first_lines(1), CORRECT_CODE), None);
        let collaborators = Collaborators::line_based();
        let config = HintConfig::default();
        let mut distances = DistanceCache::new();

        let decision = decide(&PathFinderV1, &sg, &mut distances, &collaborators, &config, &learner).unwrap();
        assert_eq!(decision.route, Route::ThroughGraph);
        assert_eq!(decision.target.code().unwrap().variants()[0].tree().children.len(), 3);

        let decision = decide(&PathFinderV2, &sg, &mut distances, &collaborators, &config, &learner).unwrap();
        assert_eq!(decision.route, Route::ThroughGraph);
        assert_eq!(decision.target.rate(), Some(0.5));
    }

    #[test]
    fn empty_graph_has_no_goal() {
        let mut sg = SolutionGraph::new(
            GraphConfig::new(Task::new("pies"), Language::Python),
            code("", CORRECT_CODE),
        );
        sg.find_or_create_vertex(Some(code("a = 1", CORRECT_CODE)), None).unwrap();
        sg.find_all_medians();
        let learner = sg.detached_vertex(code("b = 1\nprint(b)", CORRECT_CODE), None);
        let collaborators = Collaborators::line_based();
        let config = HintConfig::default();
        for finder in [&PathFinderV1 as &dyn PathFinder, &PathFinderV2] {
            let mut distances = DistanceCache::new();
            let err = decide(finder, &sg, &mut distances, &collaborators, &config, &learner).unwrap_err();
            assert!(matches!(err, HintError::NoGoalAvailable { .. }));
        }
    }

    #[test]
    fn v2_never_recommends_a_rate_regression() {
        let mut sg = SolutionGraph::new(
            GraphConfig::new(Task::new("pies"), Language::Python),
            code("", CORRECT_CODE),
        );
        let user = User::new("u");
        sg.add_code_info_chain(vec![
            (code("a = int(input())\nprint(a)", 0.5), CodeInfo::new(user.clone())),
            (code("a = int(input())\nprint(a)\nfor i in range(a):", CORRECT_CODE), CodeInfo::new(user.clone())),
            (code(GOAL, FULL_SOLUTION), CodeInfo::new(user)),
        ])
        .unwrap();
        sg.find_all_medians();
        let learner = sg.detached_vertex(code("a = int(input())\nprint(a)", 0.5), None);
        let collaborators = Collaborators::line_based();
        let config = HintConfig::default();
        let mut distances = DistanceCache::new();

        let decision = decide(&PathFinderV2, &sg, &mut distances, &collaborators, &config, &learner).unwrap();
        assert_eq!(decision.route, Route::DirectToGoal);
    }

    #[test]
    fn rollback_probability_counts_included_lines() {
        let mut sg = graph();
        let learner = sg.detached_vertex(code(&first_lines(2), CORRECT_CODE), None);
        let candidate = sg.detached_vertex(code(&first_lines(3), CORRECT_CODE), None);
        let collaborators = Collaborators::line_based();
        let config = HintConfig::default();
        let mut distances = DistanceCache::new();
        let ctx = FinderContext {
            graph: &sg,
            distances: &mut distances,
            collaborators: &collaborators,
            config: &config,
        };
        let p = PathFinderV2::rollback_probability(&ctx, &learner, &candidate).unwrap();
        assert!((p - 2.0 / 3.0).abs() < 1e-9);
        let empty = sg.empty_vertex();
        assert_eq!(PathFinderV2::rollback_probability(&ctx, &learner, empty).unwrap(), 1.0);
    }

    #[test]
    fn far_anchor_is_skipped_for_the_goal() {
        let mut sg = SolutionGraph::new(
            GraphConfig::new(Task::new("pies"), Language::Python),
            code("", CORRECT_CODE),
        );
        let user = User::new("u");
        let far = "for i in range(10):\n    while True:\n        break\n    pass\nimport os";
        let path = sg
            .add_code_info_chain(vec![
                (code(far, CORRECT_CODE), CodeInfo::new(user.clone())),
                (code(GOAL, FULL_SOLUTION), CodeInfo::new(user)),
            ])
            .unwrap();
        sg.find_all_medians();
        // Two edits from the goal, five from the only anchor.
        let learner = sg.detached_vertex(
            code("a = int(input())\nprint(a + b)\nprint(a - b)\na = a + 1", CORRECT_CODE),
            None,
        );
        let collaborators = Collaborators::line_based();
        let mut distances = DistanceCache::new();

        let config = HintConfig::default();
        let decision = decide(&PathFinderV2, &sg, &mut distances, &collaborators, &config, &learner).unwrap();
        assert_eq!(decision.route, Route::DirectToGoal);
        assert_eq!(decision.target.id(), path[1]);

        let config = HintConfig {
            distance_to_graph_threshold: 3.0,
            ..HintConfig::default()
        };
        let decision = decide(&PathFinderV2, &sg, &mut distances, &collaborators, &config, &learner).unwrap();
        assert_eq!(decision.route, Route::ThroughGraph);
        assert_eq!(decision.target.id(), path[0]);
    }

    #[test]
    fn v2_leaves_out_candidates_repeating_the_learner() {
        let mut sg = SolutionGraph::new(
            GraphConfig::new(Task::new("pies"), Language::Python),
            code("", CORRECT_CODE),
        );
        let user = User::new("u");
        let path = sg
            .add_code_info_chain(vec![
                (code(&first_lines(2), CORRECT_CODE), CodeInfo::new(user.clone())),
                (code(GOAL, FULL_SOLUTION), CodeInfo::new(user)),
            ])
            .unwrap();
        sg.find_all_medians();
        let learner = sg.detached_vertex(code(&first_lines(3), CORRECT_CODE), None);
        let collaborators = Collaborators::line_based();
        let mut distances = DistanceCache::new();

        // Every line of the two-line prefix is already in the learner's code.
        let mut config = HintConfig {
            weights: ScoringWeights::distance_only(),
            ..HintConfig::default()
        };
        let mut ctx = FinderContext {
            graph: &sg,
            distances: &mut distances,
            collaborators: &collaborators,
            config: &config,
        };
        let anchor = PathFinderV2.find_closest_vertex_with_path(&mut ctx, &learner).unwrap();
        assert_eq!(anchor.map(Vertex::id), Some(path[1]));

        config.rollback_probability = 1.0;
        let mut ctx = FinderContext {
            graph: &sg,
            distances: &mut distances,
            collaborators: &collaborators,
            config: &config,
        };
        let anchor = PathFinderV2.find_closest_vertex_with_path(&mut ctx, &learner).unwrap();
        assert_eq!(anchor.map(Vertex::id), Some(path[0]));
    }
}

