//! Run repository port - audit trail and resume point for Reflexion runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IterationRecord, ReflexionState, RunInfo};

/// Persistence for runs and their per-iteration records.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Register a new run.
    async fn create_run(&self, run: &RunInfo) -> DomainResult<()>;

    /// Append the record of one finished iteration.
    async fn record_iteration(&self, record: &IterationRecord) -> DomainResult<()>;

    /// Get a run by ID.
    async fn get_run(&self, run_id: Uuid) -> DomainResult<Option<RunInfo>>;

    /// List runs, most recent first.
    async fn list_runs(&self) -> DomainResult<Vec<RunInfo>>;

    /// List a run's iteration records in iteration order.
    async fn list_iterations(&self, run_id: Uuid) -> DomainResult<Vec<IterationRecord>>;

    /// State after the last recorded iteration, if any.
    async fn latest_state(&self, run_id: Uuid) -> DomainResult<Option<ReflexionState>>;
}
