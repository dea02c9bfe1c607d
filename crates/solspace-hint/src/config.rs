//! Hint configuration: routing thresholds, scoring weights, path finder.
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```json
//! {
//!   "diffs_percent_to_go_directly": 0.2,
//!   "weights": { "structure": 4.0 },
//!   "users_number": { "pies": 120 },
//!   "strategy": "v1"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use solspace_core::Task;

use crate::error::HintError;
use crate::finder::{PathFinder, PathFinderV1, PathFinderV2};

pub const DIFFS_PERCENT_TO_GO_DIRECTLY: f64 = 0.2;
pub const DISTANCE_TO_GRAPH_THRESHOLD: f64 = 2.0;
pub const ROLLBACK_PROBABILITY: f64 = 0.7;

/// Which path finder serves hint requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Anchors must be at most as far from the goal as the learner.
    V1,
    /// Anchors are the learner vertex's children, or vertices passing the
    /// line-inclusion rollback filter.
    #[default]
    V2,
}

impl Strategy {
    pub fn path_finder(self) -> Box<dyn PathFinder> {
        match self {
            Strategy::V1 => Box::new(PathFinderV1),
            Strategy::V2 => Box::new(PathFinderV2),
        }
    }
}

/// Weights of the candidate score. Lower score = better candidate.
///
/// `users` is applied with a negative sign: more learners through a vertex
/// make it more attractive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub diffs: f64,
    pub users: f64,
    pub rate: f64,
    pub rollback: f64,
    pub structure: f64,
    pub age: f64,
    pub experience: f64,
}

impl ScoringWeights {
    /// Tree-based scorer with the structure term.
    pub fn tree_v7() -> Self {
        ScoringWeights {
            diffs: 0.5,
            users: 0.5,
            rate: 0.3,
            rollback: 4.0,
            structure: 6.5,
            age: 0.15,
            experience: 0.15,
        }
    }

    /// Older vertex scorer: edit distance only, population breaks ties.
    pub fn distance_only() -> Self {
        ScoringWeights {
            diffs: 1.0,
            users: 0.0,
            rate: 0.0,
            rollback: 0.0,
            structure: 0.0,
            age: 0.0,
            experience: 0.0,
        }
    }

    fn all(&self) -> [(&'static str, f64); 7] {
        [
            ("diffs", self.diffs),
            ("users", self.users),
            ("rate", self.rate),
            ("rollback", self.rollback),
            ("structure", self.structure),
            ("age", self.age),
            ("experience", self.experience),
        ]
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::tree_v7()
    }
}

/// All knobs of a hint handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintConfig {
    /// Go straight to the goal once the remaining distance is at most this
    /// share of the whole journey.
    pub diffs_percent_to_go_directly: f64,
    /// Go straight to the goal when reaching the anchor costs more than this
    /// multiple of reaching the goal.
    pub distance_to_graph_threshold: f64,
    /// Upper bound of the line-inclusion rollback filter (V2).
    pub rollback_probability: f64,
    pub weights: ScoringWeights,
    /// Population normaliser per task name.
    pub users_number: BTreeMap<String, f64>,
    /// Population normaliser for tasks missing from `users_number`.
    pub default_users_number: f64,
    pub strategy: Strategy,
    /// Also fold each learner's submitted code into the graph.
    pub record_learner_code: bool,
}

impl Default for HintConfig {
    fn default() -> Self {
        HintConfig {
            diffs_percent_to_go_directly: DIFFS_PERCENT_TO_GO_DIRECTLY,
            distance_to_graph_threshold: DISTANCE_TO_GRAPH_THRESHOLD,
            rollback_probability: ROLLBACK_PROBABILITY,
            weights: ScoringWeights::default(),
            users_number: BTreeMap::new(),
            default_users_number: 1.0,
            strategy: Strategy::default(),
            record_learner_code: false,
        }
    }
}

impl HintConfig {
    pub fn from_json_str(json: &str) -> Result<Self, HintError> {
        let config: HintConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, HintError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), HintError> {
        let ratio = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(HintError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {v}"
                )))
            }
        };
        ratio("diffs_percent_to_go_directly", self.diffs_percent_to_go_directly)?;
        ratio("distance_to_graph_threshold", self.distance_to_graph_threshold)?;
        ratio("rollback_probability", self.rollback_probability)?;
        for (name, weight) in self.weights.all() {
            ratio(&format!("weights.{name}"), weight)?;
        }
        let normalisers = std::iter::once(("default", self.default_users_number))
            .chain(self.users_number.iter().map(|(t, n)| (t.as_str(), *n)));
        for (task, n) in normalisers {
            if !(n.is_finite() && n > 0.0) {
                return Err(HintError::InvalidConfig(format!(
                    "users_number for {task} must be positive, got {n}"
                )));
            }
        }
        Ok(())
    }

    /// Population normaliser for `task`.
    pub fn users_number(&self, task: &Task) -> f64 {
        self.users_number
            .get(task.as_str())
            .copied()
            .unwrap_or(self.default_users_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = HintConfig::from_json_str("{}").unwrap();
        assert_eq!(config, HintConfig::default());
        assert_eq!(config.weights, ScoringWeights::tree_v7());
        assert_eq!(config.strategy, Strategy::V2);
    }

    #[test]
    fn partial_weights_keep_other_defaults() {
        let config = HintConfig::from_json_str(
            r#"{"weights": {"structure": 1.0}, "strategy": "v1", "users_number": {"pies": 40}}"#,
        )
        .unwrap();
        assert_eq!(config.weights.structure, 1.0);
        assert_eq!(config.weights.rollback, 4.0);
        assert_eq!(config.strategy, Strategy::V1);
        assert_eq!(config.users_number(&Task::new("pies")), 40.0);
        assert_eq!(config.users_number(&Task::new("zero")), 1.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            HintConfig::from_json_str(r#"{"default_users_number": 0}"#),
            Err(HintError::InvalidConfig(_))
        ));
        assert!(matches!(
            HintConfig::from_json_str(r#"{"weights": {"diffs": -1}}"#),
            Err(HintError::InvalidConfig(_))
        ));
        assert!(matches!(
            HintConfig::from_json_str(r#"{"strategy": "v9"}"#),
            Err(HintError::ConfigParse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hint.json");
        std::fs::write(&path, r#"{"rollback_probability": 0.5}"#).unwrap();
        assert_eq!(HintConfig::load(&path).unwrap().rollback_probability, 0.5);
    }
}
