//! Syntax trees exchanged with the parser, diff and renderer collaborators.
//!
//! The core never builds trees from source itself. It only compares them,
//! hashes them, summarises their shape, and hands them back to collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A language-independent ordered tree.
///
/// Two trees are AST-equal iff they are `==`: same kind, same label, same
/// children in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SyntaxTree>,
}

impl SyntaxTree {
    pub fn new(kind: impl Into<String>) -> Self {
        SyntaxTree {
            kind: kind.into(),
            label: None,
            children: Vec::new(),
        }
    }

    pub fn leaf(kind: impl Into<String>, label: impl Into<String>) -> Self {
        SyntaxTree {
            kind: kind.into(),
            label: Some(label.into()),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<SyntaxTree>) -> Self {
        self.children = children;
        self
    }

    /// Total number of nodes, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SyntaxTree::node_count).sum::<usize>()
    }

    /// Pre-order iterator over every node.
    pub fn iter(&self) -> impl Iterator<Item = &SyntaxTree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Deterministic blake3 digest of the whole tree.
    ///
    /// Equal trees always produce equal digests. Used to index vertices by
    /// canonical form; a digest hit is still confirmed with `==`.
    pub fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        self.hash_into(&mut hasher);
        hasher.finalize()
    }

    fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&(self.kind.len() as u64).to_le_bytes());
        hasher.update(self.kind.as_bytes());
        match &self.label {
            Some(label) => {
                hasher.update(&[1]);
                hasher.update(&(label.len() as u64).to_le_bytes());
                hasher.update(label.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&(self.children.len() as u64).to_le_bytes());
        for child in &self.children {
            child.hash_into(hasher);
        }
    }
}

/// Cheap shape summary of a tree: node count plus node-kind multiset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstStructure {
    pub nodes_number: usize,
    pub kinds: BTreeMap<String, usize>,
}

impl AstStructure {
    pub fn of(tree: &SyntaxTree) -> Self {
        let mut kinds = BTreeMap::new();
        let mut nodes_number = 0;
        for node in tree.iter() {
            nodes_number += 1;
            *kinds.entry(node.kind.clone()).or_insert(0) += 1;
        }
        AstStructure {
            nodes_number,
            kinds,
        }
    }

    /// Share of the two kind multisets that does not overlap, in `[0, 1]`.
    ///
    /// 0 means both trees use exactly the same node kinds the same number of
    /// times; 1 means they share no node kind at all.
    pub fn mismatch(&self, other: &AstStructure) -> f64 {
        let total = self.nodes_number + other.nodes_number;
        if total == 0 {
            return 0.0;
        }
        let mut differing = 0usize;
        for (kind, &count) in &self.kinds {
            let theirs = other.kinds.get(kind).copied().unwrap_or(0);
            differing += count.abs_diff(theirs);
        }
        for (kind, &count) in &other.kinds {
            if !self.kinds.contains_key(kind) {
                differing += count;
            }
        }
        differing as f64 / total as f64
    }
}
