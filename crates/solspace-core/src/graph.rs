//! SolutionGraph: the DAG of code states for one (task, language) pair.
//!
//! [`SolutionGraph`] is the single entry point for building and querying a
//! solution space. Vertices are keyed by canonical-tree equality: inserting
//! a code state whose canonical tree already exists merges it into that
//! vertex instead of creating a new one.
//!
//! # Shape
//!
//! Every graph has two synthetic sentinels. `start` has no parents and is the
//! root of [`SolutionGraph::get_traversal`]; `end` has no children and its
//! parents are the goals (full solutions). The graph is kept acyclic: an edge
//! that would close a cycle is skipped.
//!
//! The underlying `StableGraph` is private. All mutations go through the
//! builder methods below so the canonical index and the id map stay in sync.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::code::{Code, Language, Task};
use crate::error::CoreError;
use crate::id::{IdAllocator, VertexId};
use crate::info::CodeInfo;
use crate::serialized::{CodeStore, SerializedCode, VariantOutcome};
use crate::tree::SyntaxTree;
use crate::vertex::{Vertex, VertexKind};

/// Prefix of serialized variant files.
pub const DEFAULT_FILE_PREFIX: &str = "code";
/// Prefix of per-graph folders holding variant files.
pub const GRAPH_FOLDER_PREFIX: &str = "graph";

/// What a graph is built for and where its variant files go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub task: Task,
    pub language: Language,
    pub store: CodeStore,
}

impl GraphConfig {
    /// In-memory graph: no variant files are written.
    pub fn new(task: Task, language: Language) -> Self {
        GraphConfig {
            task,
            language,
            store: CodeStore::in_memory(DEFAULT_FILE_PREFIX),
        }
    }

    /// Writes variant files under `{root}/graph_{task}_{language}/`.
    pub fn with_files_under(mut self, root: &Path) -> Self {
        let folder = root.join(format!(
            "{GRAPH_FOLDER_PREFIX}_{}_{}",
            self.task, self.language
        ));
        self.store = CodeStore::on_disk(folder, self.store.file_prefix().to_string());
        self
    }
}

fn canonical_key(tree: &SyntaxTree) -> [u8; 32] {
    *tree.content_hash().as_bytes()
}

/// The solution-space DAG with its start/end sentinels.
#[derive(Debug, Clone)]
pub struct SolutionGraph {
    config: GraphConfig,
    dag: StableGraph<Vertex, (), Directed, u32>,
    /// VertexId -> node in `dag`
    nodes: HashMap<VertexId, NodeIndex<u32>>,
    /// canonical tree hash -> vertices with that hash (equality confirmed on lookup)
    canonical_index: HashMap<[u8; 32], Vec<VertexId>>,
    start: VertexId,
    end: VertexId,
    /// Detached vertex holding the empty program.
    empty: Vertex,
    ids: IdAllocator,
    medians_ready: bool,
}

impl SolutionGraph {
    /// Creates a graph with fresh start/end sentinels. `empty_code` is the
    /// parsed empty program, kept as a detached vertex.
    pub fn new(config: GraphConfig, empty_code: Code) -> Self {
        let mut ids = IdAllocator::new();
        let mut dag = StableGraph::new();
        let mut nodes = HashMap::new();

        let start = ids.next_vertex_id();
        nodes.insert(start, dag.add_node(Vertex::start(start)));
        let end = ids.next_vertex_id();
        nodes.insert(end, dag.add_node(Vertex::end(end)));

        let empty_id = ids.next_vertex_id();
        let scratch = CodeStore::in_memory(config.store.file_prefix().to_string());
        let mut empty = Vertex::intermediate(
            empty_id,
            SerializedCode::new(empty_code, None, empty_id, &mut ids, &scratch),
        );
        empty.find_medians();

        info!(task = %config.task, language = %config.language, "created solution graph");
        SolutionGraph {
            config,
            dag,
            nodes,
            canonical_index: HashMap::new(),
            start,
            end,
            empty,
            ids,
            medians_ready: false,
        }
    }

    /// Reassembles a graph from stored parts.
    ///
    /// `vertices` must include both sentinels; `edges` are re-added in the
    /// given order, which becomes the child visiting order.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        config: GraphConfig,
        vertices: Vec<Vertex>,
        edges: Vec<(VertexId, VertexId)>,
        start: VertexId,
        end: VertexId,
        empty: Vertex,
        ids: IdAllocator,
        medians_ready: bool,
    ) -> Result<Self, CoreError> {
        let mut graph = SolutionGraph {
            config,
            dag: StableGraph::new(),
            nodes: HashMap::new(),
            canonical_index: HashMap::new(),
            start,
            end,
            empty,
            ids,
            medians_ready,
        };
        for vertex in vertices {
            let id = vertex.id();
            if let Some(canonical) = vertex.canonical() {
                graph
                    .canonical_index
                    .entry(canonical_key(canonical))
                    .or_default()
                    .push(id);
            }
            graph.nodes.insert(id, graph.dag.add_node(vertex));
        }
        for id in [start, end] {
            graph.node(id)?;
        }
        for (from, to) in edges {
            let a = graph.node(from)?;
            let b = graph.node(to)?;
            graph.dag.add_edge(a, b, ());
        }
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn task(&self) -> &Task {
        &self.config.task
    }

    pub fn language(&self) -> Language {
        self.config.language
    }

    pub fn start_id(&self) -> VertexId {
        self.start
    }

    pub fn end_id(&self) -> VertexId {
        self.end
    }

    /// The detached empty-program vertex.
    pub fn empty_vertex(&self) -> &Vertex {
        &self.empty
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Whether [`SolutionGraph::find_all_medians`] has run.
    pub fn medians_ready(&self) -> bool {
        self.medians_ready
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.nodes.get(&id).map(|&n| &self.dag[n])
    }

    /// All vertices (sentinels included) in creation order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.dag.node_indices().map(move |n| &self.dag[n])
    }

    pub fn vertex_count(&self) -> usize {
        self.dag.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Every edge as `(parent, child)` in insertion order.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        self.dag
            .edge_indices()
            .filter_map(|e| self.dag.edge_endpoints(e))
            .map(|(a, b)| (self.dag[a].id(), self.dag[b].id()))
            .collect()
    }

    /// Children of `id` in the order their edges were added.
    pub fn children(&self, id: VertexId) -> Result<Vec<&Vertex>, CoreError> {
        self.adjacent(id, Direction::Outgoing)
    }

    /// Parents of `id` in the order their edges were added.
    pub fn parents(&self, id: VertexId) -> Result<Vec<&Vertex>, CoreError> {
        self.adjacent(id, Direction::Incoming)
    }

    /// Goal vertices: the parents of `end`.
    pub fn goals(&self) -> Vec<&Vertex> {
        self.adjacent(self.end, Direction::Incoming)
            .unwrap_or_default()
    }

    /// Exact lookup by canonical tree.
    pub fn find_vertex(&self, canonical: &SyntaxTree) -> Option<&Vertex> {
        self.find_vertex_id(canonical).and_then(|id| self.vertex(id))
    }

    /// Breadth-first traversal from `start`, excluding `end`. Each vertex is
    /// visited once; children in insertion order.
    pub fn get_traversal(&self) -> Vec<&Vertex> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.start);
        seen.insert(self.start);

        while let Some(id) = queue.pop_front() {
            let Some(vertex) = self.vertex(id) else {
                continue;
            };
            order.push(vertex);
            for child in self.adjacent(id, Direction::Outgoing).unwrap_or_default() {
                if child.kind() != VertexKind::End && seen.insert(child.id()) {
                    queue.push_back(child.id());
                }
            }
        }
        order
    }

    // -----------------------------------------------------------------------
    // Builder methods
    // -----------------------------------------------------------------------

    /// Finds the vertex with `code`'s canonical tree and merges `code_info`
    /// into it, or creates a new vertex wired to `start` (and to `end` when
    /// `code` is a full solution).
    pub fn find_or_create_vertex(
        &mut self,
        code: Option<Code>,
        code_info: Option<CodeInfo>,
    ) -> Result<VertexId, CoreError> {
        let code = code.ok_or_else(|| CoreError::invalid_input("code is absent"))?;
        let full = code.is_full();
        let (id, created) = self.insert_code(code, code_info)?;
        if created {
            self.connect_to_start(id)?;
            if full {
                self.connect_to_end(id)?;
            }
        }
        Ok(id)
    }

    /// Merges or creates a vertex for `code` without wiring any edge.
    pub fn add_vertex(
        &mut self,
        code: Code,
        code_info: Option<CodeInfo>,
    ) -> Result<VertexId, CoreError> {
        self.insert_code(code, code_info).map(|(id, _)| id)
    }

    /// Folds one learner's ordered history into the graph.
    ///
    /// The first element is linked to `start`, each consecutive pair
    /// parent -> child, and every full solution to `end`. Consecutive
    /// elements that land on the same vertex are not linked.
    ///
    /// Rates are checked for the whole chain first; on `InconsistentRate`
    /// the graph is left untouched.
    pub fn add_code_info_chain(
        &mut self,
        chain: Vec<(Code, CodeInfo)>,
    ) -> Result<Vec<VertexId>, CoreError> {
        self.check_chain_rates(&chain)?;
        let mut path = Vec::with_capacity(chain.len());
        for (code, code_info) in chain {
            let full = code.is_full();
            let (id, _) = self.insert_code(code, Some(code_info))?;
            match path.last() {
                None => {
                    self.connect_to_start(id)?;
                }
                Some(&prev) => {
                    self.add_edge(prev, id)?;
                }
            }
            if full {
                self.connect_to_end(id)?;
            }
            path.push(id);
        }
        debug!(length = path.len(), "added code info chain");
        Ok(path)
    }

    pub fn connect_to_start(&mut self, id: VertexId) -> Result<bool, CoreError> {
        self.add_edge(self.start, id)
    }

    pub fn connect_to_end(&mut self, id: VertexId) -> Result<bool, CoreError> {
        self.add_edge(id, self.end)
    }

    /// Adds `from -> to`. Returns `false` when the edge was skipped because
    /// it already exists, is a self loop, or would close a cycle.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool, CoreError> {
        let a = self.node(from)?;
        let b = self.node(to)?;
        if to == self.start || from == self.end {
            return Err(CoreError::invalid_input(format!(
                "edge {from} -> {to} would give a sentinel a forbidden neighbour"
            )));
        }
        if a == b {
            debug!(vertex = %from, "skipping self loop");
            return Ok(false);
        }
        if self.dag.find_edge(a, b).is_some() {
            return Ok(false);
        }
        if has_path_connecting(&self.dag, b, a, None) {
            debug!(from = %from, to = %to, "skipping edge that would close a cycle");
            return Ok(false);
        }
        self.dag.add_edge(a, b, ());
        Ok(true)
    }

    /// Computes age/experience medians for every vertex. Later merges and
    /// creations keep the touched vertex's medians current.
    pub fn find_all_medians(&mut self) {
        for vertex in self.dag.node_weights_mut() {
            vertex.find_medians();
        }
        self.empty.find_medians();
        self.medians_ready = true;
        info!(vertices = self.dag.node_count(), "computed medians");
    }

    /// Builds a vertex for a live learner's code with a fresh id. It is not
    /// inserted into the graph; its medians are computed right away.
    pub fn detached_vertex(&mut self, code: Code, code_info: Option<CodeInfo>) -> Vertex {
        let id = self.ids.next_vertex_id();
        let scratch = CodeStore::in_memory(self.config.store.file_prefix().to_string());
        let mut vertex = Vertex::intermediate(
            id,
            SerializedCode::new(code, code_info, id, &mut self.ids, &scratch),
        );
        vertex.find_medians();
        vertex
    }

    /// Rewrites every variant file into the configured store.
    pub fn recreate_files(&mut self) {
        for vertex in self.dag.node_weights_mut() {
            let id = vertex.id();
            if let Some(code) = vertex.code_mut() {
                code.recreate_files(id, &self.config.store);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn node(&self, id: VertexId) -> Result<NodeIndex<u32>, CoreError> {
        self.nodes
            .get(&id)
            .copied()
            .ok_or(CoreError::VertexNotFound { id })
    }

    fn adjacent(&self, id: VertexId, direction: Direction) -> Result<Vec<&Vertex>, CoreError> {
        let node = self.node(id)?;
        let mut edges: Vec<(EdgeIndex<u32>, NodeIndex<u32>)> = self
            .dag
            .edges_directed(node, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(e, _)| *e);
        Ok(edges.into_iter().map(|(_, n)| &self.dag[n]).collect())
    }

    fn find_vertex_id(&self, canonical: &SyntaxTree) -> Option<VertexId> {
        self.canonical_index
            .get(&canonical_key(canonical))?
            .iter()
            .copied()
            .find(|id| self.vertex(*id).and_then(Vertex::canonical) == Some(canonical))
    }

    /// Every link must agree on rate with the vertex holding its canonical
    /// tree, or with the earlier link that will create that vertex.
    fn check_chain_rates(&self, chain: &[(Code, CodeInfo)]) -> Result<(), CoreError> {
        let mut pending: HashMap<[u8; 32], Vec<(&SyntaxTree, f64)>> = HashMap::new();
        for (code, _) in chain {
            let established = match self.find_vertex(&code.canonical) {
                Some(vertex) => vertex.rate().map(|rate| (Some(vertex.id()), rate)),
                None => pending
                    .get(&canonical_key(&code.canonical))
                    .and_then(|seen| seen.iter().find(|(tree, _)| *tree == &code.canonical))
                    .map(|&(_, rate)| (None, rate)),
            };
            match established {
                Some((vertex, rate)) if rate != code.rate => {
                    return Err(CoreError::InconsistentRate {
                        vertex,
                        established: rate,
                        new: code.rate,
                    });
                }
                Some(_) => {}
                None => pending
                    .entry(canonical_key(&code.canonical))
                    .or_default()
                    .push((&code.canonical, code.rate)),
            }
        }
        Ok(())
    }

    /// Merges `code` into the vertex with its canonical tree or creates one.
    /// Returns the vertex id and whether it was created.
    fn insert_code(
        &mut self,
        code: Code,
        code_info: Option<CodeInfo>,
    ) -> Result<(VertexId, bool), CoreError> {
        if let Some(id) = self.find_vertex_id(&code.canonical) {
            let node = self.node(id)?;
            let vertex = &mut self.dag[node];
            let serialized = vertex
                .code_mut()
                .ok_or_else(|| CoreError::invalid_input(format!("vertex {id} has no code")))?;
            let outcome = serialized.add_variant(
                code.anonymized,
                code.rate,
                code_info,
                id,
                &mut self.ids,
                &self.config.store,
            )?;
            if self.medians_ready {
                vertex.find_medians();
            }
            match outcome {
                VariantOutcome::Merged(variant) => {
                    debug!(vertex = %id, variant = %variant, "merged code into existing variant")
                }
                VariantOutcome::Created(variant) => {
                    debug!(vertex = %id, variant = %variant, "added variant to existing vertex")
                }
            }
            return Ok((id, false));
        }

        let id = self.ids.next_vertex_id();
        let key = canonical_key(&code.canonical);
        let serialized = SerializedCode::new(code, code_info, id, &mut self.ids, &self.config.store);
        let mut vertex = Vertex::intermediate(id, serialized);
        if self.medians_ready {
            vertex.find_medians();
        }
        let node = self.dag.add_node(vertex);
        self.nodes.insert(id, node);
        self.canonical_index.entry(key).or_default().push(id);
        info!(vertex = %id, "created vertex");
        Ok((id, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CORRECT_CODE, FULL_SOLUTION};
    use crate::collab::TreeParser;
    use crate::info::{Profile, User};
    use crate::line::LineParser;

    fn code(source: &str, rate: f64) -> Code {
        let parsed = LineParser::default().parse(source).unwrap();
        Code::new(parsed.canonical, parsed.anonymized, rate, Language::Python).unwrap()
    }

    fn new_graph() -> SolutionGraph {
        SolutionGraph::new(
            GraphConfig::new(Task::new("pies"), Language::Python),
            code("", CORRECT_CODE),
        )
    }

    fn user_info(id: &str) -> CodeInfo {
        CodeInfo::new(User::new(id))
    }

    fn ids(vertices: &[&Vertex]) -> Vec<VertexId> {
        vertices.iter().map(|v| v.id()).collect()
    }

    fn rendered(graph: &SolutionGraph, id: VertexId) -> String {
        use crate::collab::TreeRenderer;
        let vertex = graph.vertex(id).unwrap();
        crate::line::LineRenderer
            .render(&vertex.code().unwrap().variants()[0].tree().clone())
            .unwrap()
    }

    #[test]
    fn bfs_traversal_visits_diamond_in_insertion_order() {
        let mut sg = new_graph();
        //          start
        //            |
        //            v1
        //        /   |   \
        //      v2    v3    v4
        //        \  /  \  /
        //         v5    v6
        //                |
        //               end
        let sources = ["a = 1", "print(a)", "a = input()", "if a:", "for a in b:", "return a"];
        let v: Vec<VertexId> = sources
            .iter()
            .map(|s| sg.add_vertex(code(s, CORRECT_CODE), None).unwrap())
            .collect();
        sg.connect_to_start(v[0]).unwrap();
        for (a, b) in [(0, 1), (0, 2), (0, 3), (1, 4), (2, 4), (2, 5), (3, 5)] {
            assert!(sg.add_edge(v[a], v[b]).unwrap());
        }
        sg.connect_to_end(v[5]).unwrap();

        let mut expected = vec![sg.start_id()];
        expected.extend(v.iter().copied());
        assert_eq!(ids(&sg.get_traversal()), expected);
        assert_eq!(ids(&sg.goals()), vec![v[5]]);
    }

    #[test]
    fn canonical_equal_codes_share_one_vertex() {
        let mut sg = new_graph();
        let a = sg
            .find_or_create_vertex(Some(code("a = 5\nprint(a)", CORRECT_CODE)), Some(user_info("u1")))
            .unwrap();
        let b = sg
            .find_or_create_vertex(Some(code("five = 6\nprint(five)", CORRECT_CODE)), Some(user_info("u2")))
            .unwrap();
        assert_eq!(a, b);

        let vertex = sg.vertex(a).unwrap();
        assert_eq!(vertex.code().unwrap().variants().len(), 2);
        let users: Vec<_> = vertex.code_infos().map(|i| i.user.id.0.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(sg.children(sg.start_id()).unwrap().len(), 1);
    }

    #[test]
    fn new_full_solution_is_wired_to_start_and_end() {
        let mut sg = new_graph();
        let id = sg
            .find_or_create_vertex(Some(code("while True:\n    print('Hi')", FULL_SOLUTION)), Some(user_info("u")))
            .unwrap();
        assert_eq!(ids(&sg.parents(id).unwrap()), vec![sg.start_id()]);
        assert_eq!(ids(&sg.children(id).unwrap()), vec![sg.end_id()]);
    }

    #[test]
    fn absent_code_is_invalid_input() {
        let mut sg = new_graph();
        let err = sg.find_or_create_vertex(None, Some(user_info("u"))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[test]
    fn inconsistent_rate_propagates_from_merge() {
        let mut sg = new_graph();
        sg.find_or_create_vertex(Some(code("a = 5", CORRECT_CODE)), None).unwrap();
        let err = sg
            .find_or_create_vertex(Some(code("b = 7", FULL_SOLUTION)), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InconsistentRate { .. }));
    }

    #[test]
    fn chain_with_inconsistent_rate_leaves_graph_untouched() {
        let mut sg = new_graph();
        sg.find_or_create_vertex(Some(code("print(1)", FULL_SOLUTION)), None)
            .unwrap();
        let (vertices, edges) = (sg.vertex_count(), sg.edge_count());

        let chain = vec![
            (code("a = 1", CORRECT_CODE), user_info("u")),
            (code("a = 1\nb = 2", CORRECT_CODE), user_info("u")),
            (code("print(2)", CORRECT_CODE), user_info("u")),
        ];
        let err = sg.add_code_info_chain(chain).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InconsistentRate { established, new, .. }
                if established == FULL_SOLUTION && new == CORRECT_CODE
        ));
        assert_eq!(sg.vertex_count(), vertices);
        assert_eq!(sg.edge_count(), edges);
    }

    #[test]
    fn chain_disagreeing_with_itself_is_rejected() {
        let mut sg = new_graph();
        let chain = vec![
            (code("a = 1", CORRECT_CODE), user_info("u")),
            (code("b = 2", CORRECT_CODE), user_info("u")),
            (code("c = 3", 0.5), user_info("u")),
        ];
        let err = sg.add_code_info_chain(chain).unwrap_err();
        assert!(matches!(err, CoreError::InconsistentRate { vertex: None, .. }));
        assert_eq!(sg.vertex_count(), 2);
        assert_eq!(sg.edge_count(), 0);
    }

    #[test]
    fn code_info_chain_links_consecutive_vertices() {
        let mut sg = new_graph();
        //           start
        //         /       \
        //       v0         v1
        //        |        /  \
        //       v2      /    end
        //         \   /
        //          v3
        let rated = [
            ("", CORRECT_CODE),
            ("print('Hello')", FULL_SOLUTION),
            ("a = 5", CORRECT_CODE),
            ("x = True\nif(x):\n    x = False", CORRECT_CODE),
        ];
        let v: Vec<VertexId> = rated
            .iter()
            .enumerate()
            .map(|(i, (s, r))| {
                sg.add_vertex(code(s, *r), Some(user_info(&format!("u{i}"))))
                    .unwrap()
            })
            .collect();
        sg.connect_to_start(v[0]).unwrap();
        sg.connect_to_start(v[1]).unwrap();
        sg.add_edge(v[0], v[2]).unwrap();
        sg.add_edge(v[1], v[3]).unwrap();
        sg.add_edge(v[2], v[3]).unwrap();
        sg.connect_to_end(v[1]).unwrap();

        let learner = User::new("chain");
        let chain = vec![
            (code("a = input()", CORRECT_CODE), CodeInfo::new(learner.clone())),
            (code("b = 7", CORRECT_CODE), CodeInfo::new(learner.clone())),
            (code("a = 5\nb = 3", CORRECT_CODE), CodeInfo::new(learner.clone())),
            (code("a = 5\nb = 3\nc = 4", FULL_SOLUTION), CodeInfo::new(learner)),
        ];
        let path = sg.add_code_info_chain(chain).unwrap();
        assert_eq!(path[1], v[2], "second chain element merges into v2");

        let start_children = ids(&sg.children(sg.start_id()).unwrap());
        assert_eq!(start_children, vec![v[0], v[1], path[0]]);
        assert_eq!(ids(&sg.children(v[0]).unwrap()), vec![v[2]]);
        assert_eq!(ids(&sg.children(v[1]).unwrap()), vec![v[3], sg.end_id()]);
        assert_eq!(ids(&sg.parents(v[2]).unwrap()), vec![v[0], path[0]]);
        assert_eq!(ids(&sg.children(v[2]).unwrap()), vec![v[3], path[2]]);
        assert_eq!(ids(&sg.parents(v[3]).unwrap()), vec![v[1], v[2]]);
        assert_eq!(ids(&sg.parents(sg.end_id()).unwrap()), vec![v[1], path[3]]);
        assert!(sg.children(v[3]).unwrap().is_empty());

        assert_eq!(sg.vertex(v[2]).unwrap().code_infos().count(), 2);
        assert_eq!(rendered(&sg, path[3]), "v0 = 5\nv1 = 3\nv2 = 4");
    }

    #[test]
    fn chain_revisiting_a_vertex_does_not_link_it_to_itself() {
        let mut sg = new_graph();
        let learner = User::new("u");
        let chain = vec![
            (code("a = 5", CORRECT_CODE), CodeInfo::new(learner.clone())),
            (code("b = 6", CORRECT_CODE), CodeInfo::new(learner)),
        ];
        let path = sg.add_code_info_chain(chain).unwrap();
        assert_eq!(path[0], path[1]);
        assert!(sg.children(path[0]).unwrap().is_empty());
    }

    #[test]
    fn edges_closing_a_cycle_are_skipped() {
        let mut sg = new_graph();
        let a = sg.add_vertex(code("a = 1", CORRECT_CODE), None).unwrap();
        let b = sg.add_vertex(code("print(a)", CORRECT_CODE), None).unwrap();
        let c = sg.add_vertex(code("return a", CORRECT_CODE), None).unwrap();
        assert!(sg.add_edge(a, b).unwrap());
        assert!(sg.add_edge(b, c).unwrap());
        assert!(!sg.add_edge(c, a).unwrap());
        assert!(!sg.add_edge(a, a).unwrap());
        assert!(!sg.add_edge(a, b).unwrap());
        assert_eq!(sg.edge_count(), 2);
    }

    #[test]
    fn sentinel_edges_are_rejected() {
        let mut sg = new_graph();
        let a = sg.add_vertex(code("a = 1", CORRECT_CODE), None).unwrap();
        assert!(sg.add_edge(a, sg.start_id()).is_err());
        assert!(sg.add_edge(sg.end_id(), a).is_err());
        assert!(matches!(
            sg.add_edge(a, VertexId(999)),
            Err(CoreError::VertexNotFound { .. })
        ));
    }

    #[test]
    fn medians_stay_current_after_find_all_medians() {
        let mut sg = new_graph();
        let aged = |id: &str, age| {
            CodeInfo::new(User::with_profile(
                id,
                Profile {
                    age: Some(age),
                    experience: None,
                },
            ))
        };
        let id = sg
            .find_or_create_vertex(Some(code("a = 1", CORRECT_CODE)), Some(aged("a", 20)))
            .unwrap();
        assert!(sg.vertex(id).unwrap().age_median().is_err());

        sg.find_all_medians();
        assert_eq!(sg.vertex(id).unwrap().age_median().unwrap(), Some(20.0));

        sg.find_or_create_vertex(Some(code("b = 2", CORRECT_CODE)), Some(aged("b", 30)))
            .unwrap();
        assert_eq!(sg.vertex(id).unwrap().age_median().unwrap(), Some(25.0));
    }

    #[test]
    fn detached_vertex_is_not_part_of_the_graph() {
        let mut sg = new_graph();
        let before = sg.vertex_count();
        let learner = sg.detached_vertex(code("a = 1", CORRECT_CODE), Some(user_info("l")));
        assert_eq!(sg.vertex_count(), before);
        assert!(sg.vertex(learner.id()).is_none());
        assert!(learner.medians_ready());
        assert_eq!(sg.empty_vertex().canonical(), Some(&SyntaxTree::new("module")));
    }

    #[test]
    fn from_parts_reproduces_traversal() {
        let mut sg = new_graph();
        let learner = User::new("u");
        sg.add_code_info_chain(vec![
            (code("a = 1", CORRECT_CODE), CodeInfo::new(learner.clone())),
            (code("print(a)", CORRECT_CODE), CodeInfo::new(learner.clone())),
            (code("return a", FULL_SOLUTION), CodeInfo::new(learner)),
        ])
        .unwrap();

        let rebuilt = SolutionGraph::from_parts(
            sg.config().clone(),
            sg.vertices().cloned().collect(),
            sg.edges(),
            sg.start_id(),
            sg.end_id(),
            sg.empty_vertex().clone(),
            sg.ids().clone(),
            sg.medians_ready(),
        )
        .unwrap();
        assert_eq!(ids(&rebuilt.get_traversal()), ids(&sg.get_traversal()));
        assert_eq!(ids(&rebuilt.goals()), ids(&sg.goals()));
        let canonical = sg.vertex(VertexId(3)).unwrap().canonical().unwrap().clone();
        assert_eq!(rebuilt.find_vertex(&canonical).map(Vertex::id), Some(VertexId(3)));
    }

    #[test]
    fn variant_files_land_in_graph_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphConfig::new(Task::new("pies"), Language::Python).with_files_under(dir.path());
        let mut sg = SolutionGraph::new(config, code("", CORRECT_CODE));
        let id = sg.find_or_create_vertex(Some(code("a = 1", CORRECT_CODE)), None).unwrap();

        let variant = &sg.vertex(id).unwrap().code().unwrap().variants()[0];
        let expected = dir
            .path()
            .join("graph_pies_python")
            .join(format!("code_{}_{}.json", id, variant.id()));
        assert_eq!(variant.file(), Some(expected.as_path()));
        assert!(expected.exists());
    }
}
