//! Hint path-finding over a solution space.
//!
//! # Modules
//!
//! - [`config`]: HintConfig, scoring weight presets, Strategy
//! - [`measured`]: MeasuredVertex candidate ranking
//! - [`finder`]: PathFinder trait with the V1 and V2 strategies
//! - [`handler`]: HintHandler and the thread-shareable SharedHintHandler
//! - [`error`]: HintError

pub mod config;
pub mod error;
pub mod finder;
pub mod handler;
pub mod measured;

pub use config::{HintConfig, ScoringWeights, Strategy};
pub use error::HintError;
pub use finder::{Decision, FinderContext, PathFinder, PathFinderV1, PathFinderV2, Route};
pub use handler::{Hint, HintHandler, SharedHintHandler};
pub use measured::{rank, MeasuredVertex, ScoreTerms};
