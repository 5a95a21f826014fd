//! Iteration audit records and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::feature::Feature;
use super::state::ReflexionState;

/// Outcome of one Reflexion iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// The candidate set replaced the active set.
    Accepted,
    /// The candidate failed validation; the active set is unchanged.
    Rejected,
    /// The iteration was abandoned before a decision could be made.
    Skipped { reason: String },
}

impl Decision {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Skipped { .. } => "skipped",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Everything needed to audit or resume one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub run_id: Uuid,
    /// Iteration index the record was produced for.
    pub iteration: usize,
    pub decision: Decision,
    /// Least-important feature chosen for eviction.
    pub dropped_feature: Option<String>,
    pub candidate_feature: Option<Feature>,
    /// Validation error of the model on the incumbent feature set.
    pub old_validation_error: Option<f64>,
    /// Validation error of the model on the candidate feature set.
    pub new_validation_error: Option<f64>,
    /// State after the iteration was applied.
    pub state: ReflexionState,
    pub recorded_at: DateTime<Utc>,
}

impl IterationRecord {
    pub(crate) fn skipped(run_id: Uuid, iteration: usize, reason: String, state: ReflexionState) -> Self {
        Self {
            run_id,
            iteration,
            decision: Decision::Skipped { reason },
            dropped_feature: None,
            candidate_feature: None,
            old_validation_error: None,
            new_validation_error: None,
            state,
            recorded_at: Utc::now(),
        }
    }
}

/// Metadata describing a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub entity_count: usize,
    pub feature_count: usize,
    pub max_iterations: usize,
    pub seed: Option<u64>,
}

impl RunInfo {
    pub fn new(entity_count: usize, feature_count: usize, max_iterations: usize, seed: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            entity_count,
            feature_count,
            max_iterations,
            seed,
        }
    }
}

/// Result of a completed (or stopped) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Best-known state: the active features and full rejection history.
    pub final_state: ReflexionState,
    pub records: Vec<IterationRecord>,
    /// Whether the run ended on an external stop signal.
    pub stopped: bool,
}

impl RunSummary {
    fn count(&self, kind: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.decision.as_str() == kind)
            .count()
    }

    pub fn accepted(&self) -> usize {
        self.count("accepted")
    }

    pub fn rejected(&self) -> usize {
        self.count("rejected")
    }

    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }
}
