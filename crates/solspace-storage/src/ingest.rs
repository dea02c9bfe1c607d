//! Learner history files and batch construction of a solution space.
//!
//! A history file holds one learner's time-ordered submissions for a task:
//!
//! ```json
//! {
//!   "user": { "id": "u17", "age": 16, "experience": "from_half_to_one_year" },
//!   "submissions": [
//!     { "source": "a = int(input())", "rate": 0.0, "date": "2020-03-01T10:00:00Z",
//!       "events": [{ "kind": "run" }] }
//!   ]
//! }
//! ```
//!
//! Submissions that do not compile are dropped. Consecutive submissions with
//! equal anonymized trees collapse into one chain link carrying the events
//! of the whole run. Each chain then has its loops removed and is folded
//! into the graph.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use solspace_core::{
    remove_loops, ChainLink, Code, CodeInfo, Collaborators, Experience, GraphConfig,
    InteractionEvent, Profile, SolutionSpace, TreeParser, User, CORRECT_CODE, INCORRECT_CODE,
};

use crate::error::StorageError;

/// Extension of history files picked up by [`history_files_in`].
pub const HISTORY_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryUser {
    pub id: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub experience: Option<Experience>,
}

impl HistoryUser {
    pub fn to_user(&self) -> User {
        User::with_profile(
            self.id.clone(),
            Profile {
                age: self.age,
                experience: self.experience,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub source: String,
    pub rate: f64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
}

/// One learner's submission history for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryFile {
    pub user: HistoryUser,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

impl HistoryFile {
    pub fn read(path: &Path) -> Result<Self, StorageError> {
        let text = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| StorageError::History {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Builds the learner's chain, before loop removal.
    ///
    /// Non-compiling submissions are skipped; runs of equal anonymized trees
    /// keep the first submission's code, date and timestamp and collect
    /// every submission's events.
    pub fn code_info_chain(
        &self,
        config: &GraphConfig,
        parser: &dyn TreeParser,
    ) -> Result<Vec<ChainLink>, StorageError> {
        let user = self.user.to_user();
        let mut chain: Vec<ChainLink> = Vec::new();
        for submission in &self.submissions {
            if submission.rate == INCORRECT_CODE {
                continue;
            }
            let code = Code::from_source(
                &submission.source,
                Some(submission.rate),
                &config.task,
                config.language,
                parser,
                None,
            )?;
            if let Some((last, info)) = chain.last_mut() {
                if last.anonymized == code.anonymized {
                    info.events.extend(submission.events.iter().cloned());
                    continue;
                }
            }
            let info = CodeInfo {
                user: user.clone(),
                timestamp: submission.timestamp,
                date: submission.date,
                events: submission.events.clone(),
            };
            chain.push((code, info));
        }
        debug!(
            user = %self.user.id,
            submissions = self.submissions.len(),
            links = chain.len(),
            "built code info chain"
        );
        Ok(chain)
    }
}

/// Every `*.json` file directly under `dir`, sorted by path.
pub fn history_files_in(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let io = |source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == HISTORY_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Builds a solution space from learner history files.
///
/// Each file becomes one chain, prefixed with the empty program and cleared
/// of loops before it is folded in. Medians are computed once every chain
/// is in.
pub fn construct_solution_graph(
    history_files: &[PathBuf],
    config: GraphConfig,
    collaborators: &Collaborators,
) -> Result<SolutionSpace, StorageError> {
    let parser = collaborators.parser.as_ref();
    info!(
        task = %config.task,
        language = %config.language,
        files = history_files.len(),
        "constructing solution graph"
    );
    let mut space = SolutionSpace::new(config.clone(), parser)?;
    let empty = parser.parse("")?;

    for path in history_files {
        let history = HistoryFile::read(path)?;
        if history.submissions.is_empty() {
            warn!(file = %path.display(), "history file has no submissions");
        }
        let chain = history.code_info_chain(&config, parser)?;
        let before = chain.len();
        let empty_link = (
            Code::new(
                empty.canonical.clone(),
                empty.anonymized.clone(),
                CORRECT_CODE,
                config.language,
            )?,
            CodeInfo::new(history.user.to_user()),
        );
        let chain = remove_loops(chain, empty_link);
        info!(file = %path.display(), before, after = chain.len(), "removed loops");
        space.add_code_info_chain(chain)?;
    }

    space.graph.find_all_medians();
    info!(
        vertices = space.graph.vertex_count(),
        edges = space.graph.edge_count(),
        goals = space.graph.goals().len(),
        "solution graph constructed"
    );
    Ok(space)
}
