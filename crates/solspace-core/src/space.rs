//! A solution graph bundled with its distance cache.

use tracing::debug;

use crate::chain::ChainLink;
use crate::code::{Code, CORRECT_CODE};
use crate::collab::{EditDistance, TreeDiff, TreeParser};
use crate::distance::DistanceCache;
use crate::error::CoreError;
use crate::graph::{GraphConfig, SolutionGraph};
use crate::id::VertexId;
use crate::info::CodeInfo;
use crate::tree::SyntaxTree;

/// Everything persisted for one (task, language): the graph and the
/// pairwise distances between its canonical trees.
///
/// The two halves are separate fields so callers can hold a graph borrow
/// while growing the cache.
#[derive(Debug, Clone)]
pub struct SolutionSpace {
    pub graph: SolutionGraph,
    pub distances: DistanceCache,
}

impl SolutionSpace {
    /// Creates an empty space. The empty program is parsed with `parser`.
    pub fn new(config: GraphConfig, parser: &dyn TreeParser) -> Result<Self, CoreError> {
        let parsed = parser.parse("")?;
        let empty = Code::new(parsed.canonical, parsed.anonymized, CORRECT_CODE, config.language)?;
        let mut distances = DistanceCache::new();
        distances.register(&empty.canonical);
        Ok(SolutionSpace {
            graph: SolutionGraph::new(config, empty),
            distances,
        })
    }

    pub fn from_parts(graph: SolutionGraph, distances: DistanceCache) -> Self {
        SolutionSpace { graph, distances }
    }

    /// [`SolutionGraph::find_or_create_vertex`], registering the vertex's
    /// canonical tree with the cache.
    pub fn find_or_create_vertex(
        &mut self,
        code: Option<Code>,
        code_info: Option<CodeInfo>,
    ) -> Result<VertexId, CoreError> {
        let id = self.graph.find_or_create_vertex(code, code_info)?;
        self.register(id);
        Ok(id)
    }

    /// [`SolutionGraph::add_code_info_chain`], registering every canonical
    /// tree on the path with the cache.
    pub fn add_code_info_chain(&mut self, chain: Vec<ChainLink>) -> Result<Vec<VertexId>, CoreError> {
        let path = self.graph.add_code_info_chain(chain)?;
        for &id in &path {
            self.register(id);
        }
        Ok(path)
    }

    pub fn distance(
        &mut self,
        from: &SyntaxTree,
        to: &SyntaxTree,
        diff: &dyn TreeDiff,
    ) -> Result<EditDistance, CoreError> {
        self.distances.distance(from, to, diff)
    }

    fn register(&mut self, id: VertexId) {
        if let Some(canonical) = self.graph.vertex(id).and_then(|v| v.canonical()) {
            let index = self.distances.register(canonical);
            debug!(vertex = %id, index = %index, "registered canonical tree");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Language, Task, FULL_SOLUTION};
    use crate::info::User;
    use crate::line::{LineDiff, LineParser};

    fn code(source: &str, rate: f64) -> Code {
        Code::from_source(
            source,
            Some(rate),
            &Task::new("pies"),
            Language::Python,
            &LineParser::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn new_vertices_grow_the_cache() {
        let config = GraphConfig::new(Task::new("pies"), Language::Python);
        let mut space = SolutionSpace::new(config, &LineParser::default()).unwrap();
        assert_eq!(space.distances.len(), 1);

        space
            .add_code_info_chain(vec![
                (code("a = 1", CORRECT_CODE), CodeInfo::new(User::new("u"))),
                (code("a = 1\nprint(a)", FULL_SOLUTION), CodeInfo::new(User::new("u"))),
            ])
            .unwrap();
        space
            .find_or_create_vertex(Some(code("b = 2", CORRECT_CODE)), None)
            .unwrap();
        assert_eq!(space.distances.len(), 3);
        assert_eq!(space.distances.computed_cells(), 0);

        let empty = space.graph.empty_vertex().canonical().unwrap().clone();
        let full = code("a = 1\nprint(a)", FULL_SOLUTION).canonical;
        let d = space.distance(&empty, &full, &LineDiff).unwrap();
        assert_eq!(d, EditDistance { total: 2, deletes: 0 });
        assert_eq!(space.distances.computed_cells(), 1);
    }

    #[test]
    fn failed_chain_keeps_graph_and_cache_in_step() {
        let config = GraphConfig::new(Task::new("pies"), Language::Python);
        let mut space = SolutionSpace::new(config, &LineParser::default()).unwrap();
        space
            .find_or_create_vertex(Some(code("print(1)", FULL_SOLUTION)), None)
            .unwrap();
        let before = (
            space.graph.vertex_count(),
            space.graph.edge_count(),
            space.distances.len(),
        );

        let info = || CodeInfo::new(User::new("u"));
        let err = space
            .add_code_info_chain(vec![
                (code("a = 1", CORRECT_CODE), info()),
                (code("a = 1\nb = 2", CORRECT_CODE), info()),
                (code("print(2)", CORRECT_CODE), info()),
            ])
            .unwrap_err();
        assert!(matches!(err, CoreError::InconsistentRate { .. }));
        assert_eq!(
            (
                space.graph.vertex_count(),
                space.graph.edge_count(),
                space.distances.len(),
            ),
            before
        );
    }
}
