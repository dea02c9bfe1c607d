//! Decompose/recompose conversions between SolutionSpace and flat storage
//! rows.
//!
//! [`decompose`] breaks a SolutionSpace into a [`DecomposedSpace`] of flat
//! vectors. [`recompose`] rebuilds the space, re-adding edges in their
//! insertion order so child visiting order survives the round trip.

use solspace_core::{
    DistanceCache, EditDistance, GraphConfig, IdAllocator, SolutionGraph, SolutionSpace,
    SyntaxTree, TreeIndex, Vertex, VertexId, VertexKind,
};

use crate::error::StorageError;

/// All components of a SolutionSpace broken into flat vectors for storage.
#[derive(Debug, Clone)]
pub struct DecomposedSpace {
    pub config: GraphConfig,
    pub start: VertexId,
    pub end: VertexId,
    /// The detached empty-program vertex.
    pub empty: Vertex,
    /// Id allocator counters: (next vertex id, next variant id)
    pub next_ids: (u32, u32),
    pub medians_ready: bool,
    /// Every vertex including the sentinels, in graph order.
    pub vertices: Vec<Vertex>,
    /// Edges in insertion order.
    pub edges: Vec<(VertexId, VertexId)>,
    /// Distance-cache trees in index order.
    pub trees: Vec<SyntaxTree>,
    /// Computed distance-cache cells: (row, col, distance)
    pub cells: Vec<(TreeIndex, TreeIndex, EditDistance)>,
}

impl DecomposedSpace {
    /// Number of intermediate vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices
            .iter()
            .filter(|v| v.kind() == VertexKind::Intermediate)
            .count()
    }
}

/// Decomposes a SolutionSpace into flat vectors suitable for storage.
pub fn decompose(space: &SolutionSpace) -> DecomposedSpace {
    let graph = &space.graph;
    DecomposedSpace {
        config: graph.config().clone(),
        start: graph.start_id(),
        end: graph.end_id(),
        empty: graph.empty_vertex().clone(),
        next_ids: graph.ids().counters(),
        medians_ready: graph.medians_ready(),
        vertices: graph.vertices().cloned().collect(),
        edges: graph.edges(),
        trees: space.distances.trees().cloned().collect(),
        cells: space.distances.cells(),
    }
}

/// Rebuilds a SolutionSpace from its decomposed parts.
pub fn recompose(decomposed: DecomposedSpace) -> Result<SolutionSpace, StorageError> {
    let DecomposedSpace {
        config,
        start,
        end,
        empty,
        next_ids: (next_vertex, next_variant),
        medians_ready,
        vertices,
        edges,
        trees,
        cells,
    } = decomposed;

    for (id, kind) in [(start, VertexKind::Start), (end, VertexKind::End)] {
        match vertices.iter().find(|v| v.id() == id) {
            Some(v) if v.kind() == kind => {}
            Some(v) => {
                return Err(StorageError::ReconstructionError {
                    reason: format!("vertex {id} should be {kind}, found {}", v.kind()),
                })
            }
            None => {
                return Err(StorageError::ReconstructionError {
                    reason: format!("{kind} vertex {id} is missing"),
                })
            }
        }
    }
    if let Some(v) = vertices.iter().find(|v| v.id().0 >= next_vertex) {
        return Err(StorageError::ReconstructionError {
            reason: format!("vertex {} is not below the next vertex id {next_vertex}", v.id()),
        });
    }

    let ids = IdAllocator::from_parts(next_vertex, next_variant);
    let graph = SolutionGraph::from_parts(config, vertices, edges, start, end, empty, ids, medians_ready)
        .map_err(|e| StorageError::ReconstructionError {
            reason: e.to_string(),
        })?;
    let distances = DistanceCache::from_parts(trees, cells).map_err(|e| {
        StorageError::ReconstructionError {
            reason: e.to_string(),
        }
    })?;
    Ok(SolutionSpace::from_parts(graph, distances))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solspace_core::line::{LineDiff, LineParser};
    use solspace_core::{
        Code, CodeInfo, Language, Task, TreeParser, User, CORRECT_CODE, FULL_SOLUTION,
    };

    fn code(source: &str, rate: f64) -> Code {
        let parsed = LineParser::default().parse(source).unwrap();
        Code::new(parsed.canonical, parsed.anonymized, rate, Language::Python).unwrap()
    }

    fn build_space() -> SolutionSpace {
        let config = GraphConfig::new(Task::new("pies"), Language::Python);
        let mut space = SolutionSpace::new(config, &LineParser::default()).unwrap();
        let user = User::new("u1");
        space
            .add_code_info_chain(vec![
                (code("a = 1", CORRECT_CODE), CodeInfo::new(user.clone())),
                (code("a = 1\nb = 2", 0.5), CodeInfo::new(user.clone())),
                (code("a = 1\nb = 2\nprint(a + b)", FULL_SOLUTION), CodeInfo::new(user)),
            ])
            .unwrap();
        space
            .find_or_create_vertex(Some(code("print(1)", FULL_SOLUTION)), Some(CodeInfo::new(User::new("u2"))))
            .unwrap();
        space.graph.find_all_medians();

        let trees: Vec<SyntaxTree> = space.distances.trees().cloned().collect();
        space.distances.distance(&trees[0], &trees[1], &LineDiff).unwrap();
        space.distances.distance(&trees[2], &trees[1], &LineDiff).unwrap();
        space
    }

    fn traversal_ids(space: &SolutionSpace) -> Vec<VertexId> {
        space.graph.get_traversal().iter().map(|v| v.id()).collect()
    }

    #[test]
    fn test_roundtrip_preserves_traversal_and_ids() {
        let space = build_space();
        let decomposed = decompose(&space);
        assert_eq!(decomposed.vertex_count(), 4);

        let loaded = recompose(decomposed).unwrap();
        assert_eq!(traversal_ids(&loaded), traversal_ids(&space));
        assert_eq!(loaded.graph.edges(), space.graph.edges());
        assert_eq!(loaded.graph.ids(), space.graph.ids());
        assert!(loaded.graph.medians_ready());
        assert_eq!(loaded.graph.empty_vertex(), space.graph.empty_vertex());
    }

    #[test]
    fn test_roundtrip_preserves_distance_cache() {
        let space = build_space();
        let loaded = recompose(decompose(&space)).unwrap();
        assert_eq!(loaded.distances.len(), space.distances.len());
        assert_eq!(loaded.distances.cells(), space.distances.cells());
        assert_eq!(loaded.distances.computed_cells(), 2);
    }

    #[test]
    fn test_recompose_finds_merged_vertices() {
        let space = build_space();
        let mut loaded = recompose(decompose(&space)).unwrap();
        let before = loaded.graph.vertex_count();
        let id = loaded
            .find_or_create_vertex(Some(code("x = 9", CORRECT_CODE)), Some(CodeInfo::new(User::new("u3"))))
            .unwrap();
        assert_eq!(loaded.graph.vertex_count(), before);
        assert_eq!(loaded.graph.vertex(id).unwrap().population(), 2);
    }

    #[test]
    fn test_recompose_rejects_missing_sentinel() {
        let space = build_space();
        let mut decomposed = decompose(&space);
        let end = decomposed.end;
        decomposed.vertices.retain(|v| v.id() != end);
        decomposed.edges.retain(|&(_, to)| to != end);
        let err = recompose(decomposed).unwrap_err();
        assert!(matches!(err, StorageError::ReconstructionError { .. }));
    }

    #[test]
    fn test_recompose_rejects_stale_id_counter() {
        let space = build_space();
        let mut decomposed = decompose(&space);
        decomposed.next_ids.0 = 1;
        assert!(recompose(decomposed).is_err());
    }
}
