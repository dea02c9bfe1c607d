//! Serialized code: one canonical form with its anonymized variants.
//!
//! Every variant is materialised as a JSON file named
//! `{prefix}_{vertexId}_{variantId}.json` when the [`CodeStore`] has a
//! folder. The files exist for traceability and reloading; in-memory queries
//! never depend on them, so write failures are logged and ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::code::{is_full_solution, Code, Language};
use crate::error::CoreError;
use crate::id::{IdAllocator, UserId, VariantId, VertexId};
use crate::info::{CodeInfo, User};
use crate::tree::{AstStructure, SyntaxTree};

/// Median state of one demographic attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Median {
    /// Not computed yet.
    #[default]
    Pending,
    /// Computed, but no contributing user had the attribute set.
    Missing,
    Value(f64),
}

impl Median {
    /// Median of `values`, or [`Median::Missing`] when there are none.
    pub fn of(mut values: Vec<f64>) -> Median {
        if values.is_empty() {
            return Median::Missing;
        }
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Median::Value((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Median::Value(values[mid])
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Median::Pending)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Median::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// Age and experience medians over unique contributing users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Median,
    pub experience: Median,
}

impl Demographics {
    /// Computes medians over the distinct users behind `infos`. Unset profile
    /// values are left out; a user seen several times counts once.
    pub fn from_infos<'a>(infos: impl IntoIterator<Item = &'a CodeInfo>) -> Demographics {
        let users = unique_users(infos);
        let ages = users
            .values()
            .filter_map(|u| u.profile.age)
            .map(f64::from)
            .collect();
        let experiences = users
            .values()
            .filter_map(|u| u.profile.experience)
            .map(|e| f64::from(e.level()))
            .collect();
        Demographics {
            age: Median::of(ages),
            experience: Median::of(experiences),
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.age.is_pending() && !self.experience.is_pending()
    }
}

/// Distinct users behind a set of code infos, keyed by user id.
pub fn unique_users<'a>(infos: impl IntoIterator<Item = &'a CodeInfo>) -> BTreeMap<UserId, &'a User> {
    infos
        .into_iter()
        .map(|info| (info.user.id.clone(), &info.user))
        .collect()
}

/// Where and under which prefix variant files are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeStore {
    folder: Option<PathBuf>,
    file_prefix: String,
}

impl CodeStore {
    /// A store that keeps everything in memory.
    pub fn in_memory(file_prefix: impl Into<String>) -> Self {
        CodeStore {
            folder: None,
            file_prefix: file_prefix.into(),
        }
    }

    pub fn on_disk(folder: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        CodeStore {
            folder: Some(folder.into()),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// Deterministic path of a variant file, if this store writes files.
    pub fn variant_path(&self, vertex: VertexId, variant: VariantId) -> Option<PathBuf> {
        self.folder.as_ref().map(|folder| {
            folder.join(format!("{}_{}_{}.json", self.file_prefix, vertex, variant))
        })
    }

    /// Writes `tree` to its variant file. Returns the path on success.
    pub fn write_variant(
        &self,
        vertex: VertexId,
        variant: VariantId,
        tree: &SyntaxTree,
    ) -> Option<PathBuf> {
        let path = self.variant_path(vertex, variant)?;
        let result = (|| -> Result<(), CoreError> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, serde_json::to_vec_pretty(tree)?)?;
            Ok(())
        })();
        match result {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("could not write code file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Reads a variant tree back from its file.
    pub fn load_variant_tree(path: &Path) -> Result<SyntaxTree, CoreError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// One anonymized variant of a canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    id: VariantId,
    tree: SyntaxTree,
    rate: f64,
    structure: AstStructure,
    code_infos: Vec<CodeInfo>,
    demographics: Demographics,
    file: Option<PathBuf>,
}

impl Variant {
    fn new(
        id: VariantId,
        tree: SyntaxTree,
        rate: f64,
        code_info: Option<CodeInfo>,
        file: Option<PathBuf>,
    ) -> Self {
        Variant {
            id,
            structure: AstStructure::of(&tree),
            tree,
            rate,
            code_infos: code_info.into_iter().collect(),
            demographics: Demographics::default(),
            file,
        }
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn structure(&self) -> &AstStructure {
        &self.structure
    }

    pub fn nodes_number(&self) -> usize {
        self.structure.nodes_number
    }

    pub fn code_infos(&self) -> &[CodeInfo] {
        &self.code_infos
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn demographics(&self) -> Demographics {
        self.demographics
    }

    /// Age median, or `MedianNotReady` before medians were computed.
    pub fn age_median(&self) -> Result<Option<f64>, CoreError> {
        if self.demographics.age.is_pending() {
            return Err(CoreError::MedianNotReady {
                vertex: None,
                variant: Some(self.id),
            });
        }
        Ok(self.demographics.age.value())
    }

    pub fn experience_median(&self) -> Result<Option<f64>, CoreError> {
        if self.demographics.experience.is_pending() {
            return Err(CoreError::MedianNotReady {
                vertex: None,
                variant: Some(self.id),
            });
        }
        Ok(self.demographics.experience.value())
    }

    pub fn find_medians(&mut self) {
        self.demographics = Demographics::from_infos(&self.code_infos);
    }

    pub fn add_code_info(&mut self, code_info: CodeInfo) {
        self.code_infos.push(code_info);
        if self.demographics.is_ready() {
            self.find_medians();
        }
    }
}

/// Outcome of adding an anonymized tree to a [`SerializedCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantOutcome {
    /// The tree matched an existing variant; the code info was appended.
    Merged(VariantId),
    Created(VariantId),
}

impl VariantOutcome {
    pub fn variant_id(self) -> VariantId {
        match self {
            VariantOutcome::Merged(id) | VariantOutcome::Created(id) => id,
        }
    }
}

/// A canonical form, its shared rate, and every anonymized variant seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedCode {
    canonical: SyntaxTree,
    canonical_structure: AstStructure,
    rate: f64,
    language: Language,
    variants: Vec<Variant>,
}

impl SerializedCode {
    /// Materialises `code` as the first variant of a new canonical form.
    pub fn new(
        code: Code,
        code_info: Option<CodeInfo>,
        vertex: VertexId,
        ids: &mut IdAllocator,
        store: &CodeStore,
    ) -> Self {
        let variant_id = ids.next_variant_id();
        let file = store.write_variant(vertex, variant_id, &code.anonymized);
        let variant = Variant::new(variant_id, code.anonymized, code.rate, code_info, file);
        SerializedCode {
            canonical_structure: AstStructure::of(&code.canonical),
            canonical: code.canonical,
            rate: code.rate,
            language: code.language,
            variants: vec![variant],
        }
    }

    pub fn canonical(&self) -> &SyntaxTree {
        &self.canonical
    }

    pub fn canonical_structure(&self) -> &AstStructure {
        &self.canonical_structure
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_full(&self) -> bool {
        is_full_solution(self.rate)
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variants_mut(&mut self) -> &mut [Variant] {
        &mut self.variants
    }

    /// All code infos across variants, variant order then insertion order.
    pub fn code_infos(&self) -> impl Iterator<Item = &CodeInfo> {
        self.variants.iter().flat_map(|v| v.code_infos.iter())
    }

    /// Finds a variant AST-equal to `tree`, comparing node counts first.
    pub fn find_variant(&self, tree: &SyntaxTree) -> Option<&Variant> {
        let nodes = tree.node_count();
        self.variants
            .iter()
            .filter(|v| v.nodes_number() == nodes)
            .find(|v| &v.tree == tree)
    }

    /// Adds an anonymized tree: appends `code_info` to a matching variant,
    /// or allocates a new variant (and its file) otherwise.
    pub fn add_variant(
        &mut self,
        anonymized: SyntaxTree,
        rate: f64,
        code_info: Option<CodeInfo>,
        vertex: VertexId,
        ids: &mut IdAllocator,
        store: &CodeStore,
    ) -> Result<VariantOutcome, CoreError> {
        if rate != self.rate {
            return Err(CoreError::InconsistentRate {
                vertex: Some(vertex),
                established: self.rate,
                new: rate,
            });
        }

        let nodes = anonymized.node_count();
        if let Some(existing) = self
            .variants
            .iter_mut()
            .filter(|v| v.nodes_number() == nodes)
            .find(|v| v.tree == anonymized)
        {
            if let Some(info) = code_info {
                existing.add_code_info(info);
            }
            debug!(vertex = %vertex, variant = %existing.id, "merged code info into existing variant");
            return Ok(VariantOutcome::Merged(existing.id));
        }

        let variant_id = ids.next_variant_id();
        let file = store.write_variant(vertex, variant_id, &anonymized);
        let mut variant = Variant::new(variant_id, anonymized, rate, code_info, file);
        if self.variants.iter().all(|v| v.demographics.is_ready()) && !self.variants.is_empty() {
            variant.find_medians();
        }
        self.variants.push(variant);
        debug!(vertex = %vertex, variant = %variant_id, "created new variant");
        Ok(VariantOutcome::Created(variant_id))
    }

    pub fn find_medians(&mut self) {
        for variant in &mut self.variants {
            variant.find_medians();
        }
    }

    /// Rewrites every variant file into `store`, e.g. after reloading a graph
    /// into a new folder.
    pub fn recreate_files(&mut self, vertex: VertexId, store: &CodeStore) {
        for variant in &mut self.variants {
            variant.file = store.write_variant(vertex, variant.id, &variant.tree);
        }
    }
}
