//! Solution space model: code states, the solution graph and its distance
//! cache.
//!
//! # Modules
//!
//! - [`tree`]: SyntaxTree and its AstStructure summary
//! - [`code`]: rates, tasks, languages and scored Code
//! - [`info`]: users, profiles and per-submission CodeInfo
//! - [`collab`]: traits for parser, edit distance, edit application, renderer, test runner
//! - [`line`]: line-oriented reference collaborators
//! - [`serialized`]: SerializedCode, variants, medians and variant files
//! - [`vertex`], [`graph`]: the SolutionGraph DAG
//! - [`chain`]: learner chains and loop removal
//! - [`distance`]: the pairwise DistanceCache
//! - [`space`]: SolutionSpace, a graph plus its cache

pub mod chain;
pub mod code;
pub mod collab;
pub mod distance;
pub mod error;
pub mod graph;
pub mod id;
pub mod info;
pub mod line;
pub mod serialized;
pub mod space;
pub mod tree;
pub mod vertex;

// Re-export commonly used types
pub use chain::{remove_loops, ChainLink};
pub use code::{Code, Language, Task, CORRECT_CODE, FULL_SOLUTION, INCORRECT_CODE};
pub use collab::{
    Collaborators, DiffApplicator, EditDistance, ParsedCode, TestRunner, TreeDiff, TreeParser,
    TreeRenderer,
};
pub use distance::DistanceCache;
pub use error::{Collaborator, CoreError};
pub use graph::{GraphConfig, SolutionGraph};
pub use id::{IdAllocator, TreeIndex, UserId, VariantId, VertexId};
pub use info::{CodeInfo, Experience, InteractionEvent, Profile, User};
pub use serialized::{CodeStore, Demographics, Median, SerializedCode, Variant};
pub use space::SolutionSpace;
pub use tree::{AstStructure, SyntaxTree};
pub use vertex::{Vertex, VertexKind};
