//! Candidate ranking: a vertex scored against one learner vertex.
//!
//! ```text
//! score = w_diffs     * diffs_number
//!       - w_users     * population / users_number[task]
//!       + w_rate      * (learner.rate - candidate.rate)
//!       + w_rollback  * deletes / diffs_number
//!       + w_structure * structure_mismatch
//!       [+ w_age        * |learner.age - candidate.age|]
//!       [+ w_experience * |learner.exp - candidate.exp|]
//! ```
//!
//! `diffs_number` is +inf when the canonical trees are equal or the edit
//! distance is zero: such a candidate is never preferred, but it is not an
//! error. Ties on score go to the vertex more learners passed through.

use std::cmp::Ordering;
use std::fmt;

use solspace_core::{CoreError, DistanceCache, TreeDiff, Vertex, VertexId};

use crate::config::ScoringWeights;
use crate::error::HintError;

/// Individual weighted terms of a score, kept for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreTerms {
    pub diffs: f64,
    pub users: f64,
    pub rate: f64,
    pub rollback: f64,
    pub structure: f64,
    pub age: Option<f64>,
    pub experience: Option<f64>,
}

impl ScoreTerms {
    pub fn total(&self) -> f64 {
        self.diffs
            + self.users
            + self.rate
            + self.rollback
            + self.structure
            + self.age.unwrap_or(0.0)
            + self.experience.unwrap_or(0.0)
    }
}

impl fmt::Display for ScoreTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "diffs {:.3} + users {:.3} + rate {:.3} + rollback {:.3} + structure {:.3}",
            self.diffs, self.users, self.rate, self.rollback, self.structure
        )?;
        if let Some(age) = self.age {
            write!(f, " + age {age:.3}")?;
        }
        if let Some(exp) = self.experience {
            write!(f, " + experience {exp:.3}")?;
        }
        Ok(())
    }
}

/// `weight * value`, where a zero weight silences the term even if the
/// value is infinite.
fn weighted(weight: f64, value: f64) -> f64 {
    if weight == 0.0 {
        0.0
    } else {
        weight * value
    }
}

fn abs_diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    }
}

/// A candidate vertex measured against a learner vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredVertex {
    learner: VertexId,
    candidate: VertexId,
    diffs_number: f64,
    rollback_probability: f64,
    population: usize,
    terms: ScoreTerms,
}

impl MeasuredVertex {
    /// Scores `candidate` relative to `learner`. The directed distance
    /// learner -> candidate comes from (and grows) `distances`.
    pub fn measure(
        learner: &Vertex,
        candidate: &Vertex,
        distances: &mut DistanceCache,
        diff: &dyn TreeDiff,
        weights: &ScoringWeights,
        users_number: f64,
    ) -> Result<Self, HintError> {
        let (learner_code, candidate_code) = match (learner.code(), candidate.code()) {
            (Some(l), Some(c)) => (l, c),
            _ => {
                return Err(CoreError::invalid_input(format!(
                    "cannot measure sentinel vertex ({} against {})",
                    candidate.id(),
                    learner.id()
                ))
                .into())
            }
        };

        let (diffs_number, rollback_probability) =
            if learner_code.canonical() == candidate_code.canonical() {
                (f64::INFINITY, 0.0)
            } else {
                let d = distances.distance(learner_code.canonical(), candidate_code.canonical(), diff)?;
                if d.total == 0 {
                    (f64::INFINITY, 0.0)
                } else {
                    (f64::from(d.total), d.delete_share())
                }
            };

        let population = candidate.population();
        let age = abs_diff(learner.age_median()?, candidate.age_median()?);
        let experience = abs_diff(learner.experience_median()?, candidate.experience_median()?);

        let terms = ScoreTerms {
            diffs: weighted(weights.diffs, diffs_number),
            users: -weighted(weights.users, population as f64 / users_number),
            rate: weighted(weights.rate, learner_code.rate() - candidate_code.rate()),
            rollback: weighted(weights.rollback, rollback_probability),
            structure: weighted(
                weights.structure,
                learner_code
                    .canonical_structure()
                    .mismatch(candidate_code.canonical_structure()),
            ),
            age: age.map(|a| weighted(weights.age, a)),
            experience: experience.map(|e| weighted(weights.experience, e)),
        };

        Ok(MeasuredVertex {
            learner: learner.id(),
            candidate: candidate.id(),
            diffs_number,
            rollback_probability,
            population,
            terms,
        })
    }

    pub fn learner(&self) -> VertexId {
        self.learner
    }

    pub fn candidate(&self) -> VertexId {
        self.candidate
    }

    pub fn diffs_number(&self) -> f64 {
        self.diffs_number
    }

    pub fn rollback_probability(&self) -> f64 {
        self.rollback_probability
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn terms(&self) -> &ScoreTerms {
        &self.terms
    }

    pub fn score(&self) -> f64 {
        self.terms.total()
    }

    /// Total order among candidates of the same learner: score ascending,
    /// then population descending, then vertex id.
    pub fn try_cmp(&self, other: &MeasuredVertex) -> Result<Ordering, HintError> {
        if self.learner != other.learner {
            return Err(HintError::ComparisonTypeError {
                left: self.learner,
                right: other.learner,
            });
        }
        Ok(self.cmp_unchecked(other))
    }

    fn cmp_unchecked(&self, other: &MeasuredVertex) -> Ordering {
        self.score()
            .total_cmp(&other.score())
            .then_with(|| other.population.cmp(&self.population))
            .then_with(|| self.candidate.cmp(&other.candidate))
    }
}

impl PartialOrd for MeasuredVertex {
    /// `None` for candidates measured against different learners.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

/// Sorts candidates best first. All must share one learner.
pub fn rank(mut measured: Vec<MeasuredVertex>) -> Result<Vec<MeasuredVertex>, HintError> {
    if let Some(first) = measured.first() {
        if let Some(odd) = measured.iter().find(|m| m.learner != first.learner) {
            return Err(HintError::ComparisonTypeError {
                left: first.learner,
                right: odd.learner,
            });
        }
    }
    measured.sort_by(MeasuredVertex::cmp_unchecked);
    Ok(measured)
}
