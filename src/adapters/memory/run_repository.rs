//! In-memory RunRepository for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{IterationRecord, ReflexionState, RunInfo};
use crate::domain::ports::RunRepository;

#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<Uuid, RunInfo>>,
    iterations: RwLock<HashMap<Uuid, Vec<IterationRecord>>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create_run(&self, run: &RunInfo) -> DomainResult<()> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(DomainError::DatabaseError(format!("run {} already exists", run.id)));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn record_iteration(&self, record: &IterationRecord) -> DomainResult<()> {
        if !self.runs.read().await.contains_key(&record.run_id) {
            return Err(DomainError::DatabaseError(format!("unknown run {}", record.run_id)));
        }

        let mut iterations = self.iterations.write().await;
        let records = iterations.entry(record.run_id).or_default();
        if records.iter().any(|r| r.iteration == record.iteration) {
            return Err(DomainError::DatabaseError(format!(
                "iteration {} of run {} already recorded",
                record.iteration, record.run_id
            )));
        }
        records.push(record.clone());
        records.sort_by_key(|r| r.iteration);
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> DomainResult<Option<RunInfo>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self) -> DomainResult<Vec<RunInfo>> {
        let mut runs: Vec<RunInfo> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn list_iterations(&self, run_id: Uuid) -> DomainResult<Vec<IterationRecord>> {
        Ok(self
            .iterations
            .read()
            .await
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_state(&self, run_id: Uuid) -> DomainResult<Option<ReflexionState>> {
        Ok(self
            .iterations
            .read()
            .await
            .get(&run_id)
            .and_then(|records| records.last())
            .map(|r| r.state.clone()))
    }
}
