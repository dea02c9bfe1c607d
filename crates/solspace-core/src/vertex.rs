//! Vertex payload stored in the solution graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{UserId, VertexId};
use crate::info::{CodeInfo, User};
use crate::serialized::{unique_users, Demographics, SerializedCode};
use crate::tree::SyntaxTree;

/// Role of a vertex in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    /// Synthetic source; no parents, no code.
    Start,
    /// Synthetic sink standing for "solved"; no children, no code.
    End,
    Intermediate,
}

impl std::fmt::Display for VertexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VertexKind::Start => "start",
            VertexKind::End => "end",
            VertexKind::Intermediate => "intermediate",
        };
        f.write_str(name)
    }
}

/// One node of the solution graph.
///
/// Intermediate vertices own exactly one [`SerializedCode`]; the start and
/// end sentinels own none. Vertex-level medians aggregate the unique users
/// across every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    id: VertexId,
    kind: VertexKind,
    code: Option<SerializedCode>,
    demographics: Demographics,
}

impl Vertex {
    pub fn start(id: VertexId) -> Self {
        Vertex {
            id,
            kind: VertexKind::Start,
            code: None,
            demographics: Demographics::default(),
        }
    }

    pub fn end(id: VertexId) -> Self {
        Vertex {
            id,
            kind: VertexKind::End,
            code: None,
            demographics: Demographics::default(),
        }
    }

    pub fn intermediate(id: VertexId, code: SerializedCode) -> Self {
        Vertex {
            id,
            kind: VertexKind::Intermediate,
            code: Some(code),
            demographics: Demographics::default(),
        }
    }

    /// Reassembles a vertex from stored parts.
    pub fn from_parts(
        id: VertexId,
        kind: VertexKind,
        code: Option<SerializedCode>,
        demographics: Demographics,
    ) -> Self {
        Vertex {
            id,
            kind,
            code,
            demographics,
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    pub fn is_sentinel(&self) -> bool {
        self.kind != VertexKind::Intermediate
    }

    pub fn code(&self) -> Option<&SerializedCode> {
        self.code.as_ref()
    }

    pub(crate) fn code_mut(&mut self) -> Option<&mut SerializedCode> {
        self.code.as_mut()
    }

    pub fn canonical(&self) -> Option<&SyntaxTree> {
        self.code.as_ref().map(SerializedCode::canonical)
    }

    /// Shared rate of the vertex's variants; `None` for sentinels.
    pub fn rate(&self) -> Option<f64> {
        self.code.as_ref().map(SerializedCode::rate)
    }

    pub fn is_full(&self) -> bool {
        self.code.as_ref().is_some_and(SerializedCode::is_full)
    }

    /// Every code info across all variants.
    pub fn code_infos(&self) -> impl Iterator<Item = &CodeInfo> {
        self.code.iter().flat_map(|c| c.code_infos())
    }

    pub fn unique_users(&self) -> BTreeMap<UserId, &User> {
        unique_users(self.code_infos())
    }

    /// Number of distinct learners who passed through this vertex.
    pub fn population(&self) -> usize {
        self.unique_users().len()
    }

    pub fn demographics(&self) -> Demographics {
        self.demographics
    }

    pub fn medians_ready(&self) -> bool {
        self.demographics.is_ready()
    }

    /// Recomputes vertex and per-variant medians.
    pub fn find_medians(&mut self) {
        self.demographics = Demographics::from_infos(self.code.iter().flat_map(|c| c.code_infos()));
        if let Some(code) = self.code.as_mut() {
            code.find_medians();
        }
    }

    pub fn age_median(&self) -> Result<Option<f64>, CoreError> {
        if self.demographics.age.is_pending() {
            return Err(CoreError::MedianNotReady {
                vertex: Some(self.id),
                variant: None,
            });
        }
        Ok(self.demographics.age.value())
    }

    pub fn experience_median(&self) -> Result<Option<f64>, CoreError> {
        if self.demographics.experience.is_pending() {
            return Err(CoreError::MedianNotReady {
                vertex: Some(self.id),
                variant: None,
            });
        }
        Ok(self.demographics.experience.value())
    }
}
