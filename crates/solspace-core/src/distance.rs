//! Pairwise distance cache over distinct canonical trees.
//!
//! Trees get a row/column in insertion order. A cell is filled the first
//! time its ordered pair is requested and never recomputed or invalidated;
//! growing the matrix only appends a row and a column. `(i, j)` and `(j, i)`
//! are cached independently because edit distance may be asymmetric.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collab::{EditDistance, TreeDiff};
use crate::error::CoreError;
use crate::id::TreeIndex;
use crate::tree::SyntaxTree;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistanceCache {
    trees: IndexSet<SyntaxTree>,
    cells: Vec<Vec<Option<EditDistance>>>,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a cache from persisted trees (in index order) and cells.
    pub fn from_parts(
        trees: Vec<SyntaxTree>,
        cells: Vec<(TreeIndex, TreeIndex, EditDistance)>,
    ) -> Result<Self, CoreError> {
        let mut cache = DistanceCache::new();
        for tree in trees {
            let before = cache.len();
            cache.register(&tree);
            if cache.len() == before {
                return Err(CoreError::invalid_input(
                    "duplicate tree in persisted distance cache",
                ));
            }
        }
        for (row, col, distance) in cells {
            let n = cache.len();
            if row.0 >= n || col.0 >= n {
                return Err(CoreError::invalid_input(format!(
                    "distance cell ({row}, {col}) outside a {n}x{n} matrix"
                )));
            }
            cache.cells[row.0][col.0] = Some(distance);
        }
        Ok(cache)
    }

    /// Number of distinct trees (matrix side length).
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn index_of(&self, tree: &SyntaxTree) -> Option<TreeIndex> {
        self.trees.get_index_of(tree).map(TreeIndex)
    }

    pub fn tree(&self, index: TreeIndex) -> Option<&SyntaxTree> {
        self.trees.get_index(index.0)
    }

    /// Trees in index order.
    pub fn trees(&self) -> impl Iterator<Item = &SyntaxTree> {
        self.trees.iter()
    }

    /// Adds `tree` if unseen, appending an empty row and column.
    pub fn register(&mut self, tree: &SyntaxTree) -> TreeIndex {
        if let Some(index) = self.index_of(tree) {
            return index;
        }
        let (index, _) = self.trees.insert_full(tree.clone());
        for row in &mut self.cells {
            row.push(None);
        }
        self.cells.push(vec![None; self.trees.len()]);
        debug!(index, size = self.trees.len(), "distance cache grew");
        TreeIndex(index)
    }

    /// Directed distance `from -> to`, computing it through `diff` only on
    /// the first request for this ordered pair.
    pub fn distance(
        &mut self,
        from: &SyntaxTree,
        to: &SyntaxTree,
        diff: &dyn TreeDiff,
    ) -> Result<EditDistance, CoreError> {
        let i = self.register(from);
        let j = self.register(to);
        if let Some(cached) = self.cells[i.0][j.0] {
            return Ok(cached);
        }
        let computed = if i == j {
            EditDistance::ZERO
        } else {
            diff.edit_distance(from, to)?
        };
        self.cells[i.0][j.0] = Some(computed);
        Ok(computed)
    }

    /// Previously computed distance, without computing anything.
    pub fn cached(&self, from: &SyntaxTree, to: &SyntaxTree) -> Option<EditDistance> {
        let i = self.index_of(from)?;
        let j = self.index_of(to)?;
        self.cells[i.0][j.0]
    }

    pub fn computed_cells(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Every computed cell as `(row, col, distance)`, row-major.
    pub fn cells(&self) -> Vec<(TreeIndex, TreeIndex, EditDistance)> {
        let mut out = Vec::new();
        for (i, row) in self.cells.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                if let Some(d) = cell {
                    out.push((TreeIndex(i), TreeIndex(j), *d));
                }
            }
        }
        out
    }
}
