//! SQLite implementation of the RunRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Decision, Feature, IterationRecord, ReflexionState, RunInfo};
use crate::domain::ports::RunRepository;

use super::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn create_run(&self, run: &RunInfo) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO runs (id, started_at, entity_count, feature_count, max_iterations, seed)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(run.started_at.to_rfc3339())
        .bind(to_i64(run.entity_count)?)
        .bind(to_i64(run.feature_count)?)
        .bind(to_i64(run.max_iterations)?)
        .bind(run.seed.map(|s| s.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_iteration(&self, record: &IterationRecord) -> DomainResult<()> {
        let skip_reason = match &record.decision {
            Decision::Skipped { reason } => Some(reason.as_str()),
            _ => None,
        };
        let candidate_json = record
            .candidate_feature
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let state_json = serde_json::to_string(&record.state)?;

        sqlx::query(
            r#"INSERT INTO iterations (run_id, iteration, decision, skip_reason, dropped_feature, candidate_feature,
                                      old_validation_error, new_validation_error, state, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.run_id.to_string())
        .bind(to_i64(record.iteration)?)
        .bind(record.decision.as_str())
        .bind(skip_reason)
        .bind(record.dropped_feature.as_deref())
        .bind(candidate_json)
        .bind(record.old_validation_error)
        .bind(record.new_validation_error)
        .bind(state_json)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> DomainResult<Option<RunInfo>> {
        let row: Option<RunRow> = sqlx::query_as(
            "SELECT id, started_at, entity_count, feature_count, max_iterations, seed FROM runs WHERE id = ?",
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_runs(&self) -> DomainResult<Vec<RunInfo>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            "SELECT id, started_at, entity_count, feature_count, max_iterations, seed FROM runs ORDER BY started_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_iterations(&self, run_id: Uuid) -> DomainResult<Vec<IterationRecord>> {
        let rows: Vec<IterationRow> = sqlx::query_as(
            r#"SELECT run_id, iteration, decision, skip_reason, dropped_feature, candidate_feature,
                      old_validation_error, new_validation_error, state, recorded_at
               FROM iterations WHERE run_id = ? ORDER BY iteration ASC"#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_state(&self, run_id: Uuid) -> DomainResult<Option<ReflexionState>> {
        let state: Option<(String,)> = sqlx::query_as(
            "SELECT state FROM iterations WHERE run_id = ? ORDER BY iteration DESC LIMIT 1",
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        state.map(|(json,)| decode_state(&json)).transpose()
    }
}

fn to_i64(value: usize) -> DomainResult<i64> {
    i64::try_from(value).map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn to_usize(value: i64) -> DomainResult<usize> {
    usize::try_from(value).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Deserialize a stored state and re-check its invariants.
fn decode_state(json: &str) -> DomainResult<ReflexionState> {
    let state: ReflexionState = serde_json::from_str(json)?;
    state.check_invariants()?;
    Ok(state)
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    started_at: String,
    entity_count: i64,
    feature_count: i64,
    max_iterations: i64,
    seed: Option<String>,
}

impl TryFrom<RunRow> for RunInfo {
    type Error = DomainError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let seed = row
            .seed
            .map(|s| s.parse::<u64>())
            .transpose()
            .map_err(|e| DomainError::SerializationError(format!("Invalid seed: {e}")))?;

        Ok(Self {
            id: parse_uuid(&row.id)?,
            started_at: parse_datetime(&row.started_at)?,
            entity_count: to_usize(row.entity_count)?,
            feature_count: to_usize(row.feature_count)?,
            max_iterations: to_usize(row.max_iterations)?,
            seed,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IterationRow {
    run_id: String,
    iteration: i64,
    decision: String,
    skip_reason: Option<String>,
    dropped_feature: Option<String>,
    candidate_feature: Option<String>,
    old_validation_error: Option<f64>,
    new_validation_error: Option<f64>,
    state: String,
    recorded_at: String,
}

impl TryFrom<IterationRow> for IterationRecord {
    type Error = DomainError;

    fn try_from(row: IterationRow) -> Result<Self, Self::Error> {
        let decision = match row.decision.as_str() {
            "accepted" => Decision::Accepted,
            "rejected" => Decision::Rejected,
            "skipped" => Decision::Skipped {
                reason: row.skip_reason.unwrap_or_default(),
            },
            other => {
                return Err(DomainError::SerializationError(format!("Invalid decision: {other}")));
            }
        };

        let candidate_feature: Option<Feature> = row
            .candidate_feature
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        Ok(Self {
            run_id: parse_uuid(&row.run_id)?,
            iteration: to_usize(row.iteration)?,
            decision,
            dropped_feature: row.dropped_feature,
            candidate_feature,
            old_validation_error: row.old_validation_error,
            new_validation_error: row.new_validation_error,
            state: decode_state(&row.state)?,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}
