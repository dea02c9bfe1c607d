//! Scored code states: both normalised trees plus the pass-rate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collab::{TestRunner, TreeParser};
use crate::error::{Collaborator, CoreError};
use crate::tree::SyntaxTree;

/// Rate of code that does not compile or run.
pub const INCORRECT_CODE: f64 = -1.0;
/// Rate of code that runs but passes no test.
pub const CORRECT_CODE: f64 = 0.0;
/// Rate of a full solution.
pub const FULL_SOLUTION: f64 = 1.0;

/// Exercise identifier. One graph is built per (task, language).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Task(pub String);

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submission language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Kotlin,
    Cpp,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Cpp => "cpp",
        }
    }

    pub fn parse(value: &str) -> Option<Language> {
        match value.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "kotlin" | "kt" => Some(Language::Kotlin),
            "cpp" | "c++" => Some(Language::Cpp),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that `rate` lies in `[-1, 1]`.
pub fn validate_rate(rate: f64) -> Result<f64, CoreError> {
    if rate.is_nan() || !(INCORRECT_CODE..=FULL_SOLUTION).contains(&rate) {
        return Err(CoreError::invalid_input(format!(
            "rate {rate} is outside [-1, 1]"
        )));
    }
    Ok(rate)
}

pub fn is_full_solution(rate: f64) -> bool {
    rate == FULL_SOLUTION
}

/// One scored code state, not yet attached to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub canonical: SyntaxTree,
    pub anonymized: SyntaxTree,
    pub rate: f64,
    pub language: Language,
}

impl Code {
    pub fn new(
        canonical: SyntaxTree,
        anonymized: SyntaxTree,
        rate: f64,
        language: Language,
    ) -> Result<Self, CoreError> {
        Ok(Code {
            canonical,
            anonymized,
            rate: validate_rate(rate)?,
            language,
        })
    }

    /// Parses `source` and, when no rate is given, scores it with `runner`.
    pub fn from_source(
        source: &str,
        rate: Option<f64>,
        task: &Task,
        language: Language,
        parser: &dyn TreeParser,
        runner: Option<&dyn TestRunner>,
    ) -> Result<Self, CoreError> {
        let parsed = parser.parse(source)?;
        let rate = match (rate, runner) {
            (Some(rate), _) => rate,
            (None, Some(runner)) => runner.score(source, task)?,
            (None, None) => {
                return Err(CoreError::collaborator(
                    Collaborator::TestRunner,
                    format!("cannot rate code for task {task}: no rate and no test runner"),
                ))
            }
        };
        Code::new(parsed.canonical, parsed.anonymized, rate, language)
    }

    pub fn is_full(&self) -> bool {
        is_full_solution(self.rate)
    }
}
