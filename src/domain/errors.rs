//! Domain errors for the Reflexion feature-discovery loop.

use thiserror::Error;

/// Domain-level errors that can occur while training, scoring or iterating.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Insufficient training data: {rows} rows for {dimension} input dimensions (need at least {required})")]
    InsufficientData {
        rows: usize,
        dimension: usize,
        required: usize,
    },

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Proposal failed: {0}")]
    ProposalFailed(String),

    #[error("Duplicate feature name: {0}")]
    DuplicateFeatureName(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Errors raised by an external collaborator that a retry may clear.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ScoringFailed(_) | Self::ProposalFailed(_) | Self::DuplicateFeatureName(_)
        )
    }

    /// Errors that abandon a single iteration without aborting the run.
    pub const fn is_iteration_local(&self) -> bool {
        self.is_transient() || matches!(self, Self::InsufficientData { .. })
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
