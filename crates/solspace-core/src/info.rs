//! Learners, their profiles, and the observations tying a learner to a code
//! state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Programming experience brackets, ordered from least to most experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experience {
    LessThanHalfYear,
    FromHalfToOneYear,
    FromOneToTwoYears,
    FromTwoToFourYears,
    FromFourToSixYears,
    MoreThanSixYears,
}

impl Experience {
    /// Ordinal used for median computation.
    pub fn level(self) -> u32 {
        match self {
            Experience::LessThanHalfYear => 0,
            Experience::FromHalfToOneYear => 1,
            Experience::FromOneToTwoYears => 2,
            Experience::FromTwoToFourYears => 3,
            Experience::FromFourToSixYears => 4,
            Experience::MoreThanSixYears => 5,
        }
    }
}

/// Demographic profile. `None` marks a value the learner never provided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub experience: Option<Experience>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub profile: Profile,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        User {
            id: UserId(id.into()),
            profile: Profile::default(),
        }
    }

    pub fn with_profile(id: impl Into<String>, profile: Profile) -> Self {
        User {
            id: UserId(id.into()),
            profile,
        }
    }
}

/// A fine-grained IDE interaction (run, editor action, ...) observed while a
/// code state was current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// One observed occurrence of a code state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeInfo {
    pub user: User,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
}

impl CodeInfo {
    pub fn new(user: User) -> Self {
        CodeInfo {
            user,
            timestamp: None,
            date: None,
            events: Vec::new(),
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}
