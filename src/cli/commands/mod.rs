//! CLI command implementations.

pub mod config;
pub mod history;
pub mod resume;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapters::sqlite::{initialize_database, SqliteRunRepository};
use crate::adapters::{HttpFeatureService, InMemoryRunRepository, MockEntityScorer, MockFeatureProposer};
use crate::cli::output::progress::{create_progress_bar, track_progress};
use crate::cli::output::{format_error, CommandOutput};
use crate::domain::models::feature::feature_names;
use crate::domain::models::{Config, Decision, Entity, Feature, ReflexionState, RunSummary};
use crate::domain::ports::{EntityScorer, FeatureBootstrapper, FeatureProposer, RunRepository};
use crate::services::{ReflexionLoop, StopHandle};

/// External collaborators wired for one command invocation.
pub struct Collaborators {
    pub proposer: Arc<dyn FeatureProposer>,
    pub scorer: Arc<dyn EntityScorer>,
    pub bootstrapper: Arc<dyn FeatureBootstrapper>,
    pub repository: Arc<dyn RunRepository>,
}

impl Collaborators {
    /// Deterministic mock collaborators and an in-memory store.
    pub fn dry_run() -> Self {
        let proposer = Arc::new(MockFeatureProposer::sequential("candidate"));
        Self {
            proposer: proposer.clone(),
            scorer: Arc::new(MockEntityScorer::hashed()),
            bootstrapper: proposer,
            repository: Arc::new(InMemoryRunRepository::new()),
        }
    }

    /// The HTTP feature service and the SQLite run store.
    pub async fn live(config: &Config) -> Result<Self> {
        let service = Arc::new(
            HttpFeatureService::from_service_config(&config.service)
                .context("Failed to configure feature service client")?,
        );
        Ok(Self {
            proposer: service.clone(),
            scorer: service.clone(),
            bootstrapper: service,
            repository: open_repository(config).await?,
        })
    }
}

pub async fn open_repository(config: &Config) -> Result<Arc<dyn RunRepository>> {
    let pool = initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open run database at {}", config.database.path))?;
    Ok(Arc::new(SqliteRunRepository::new(pool)))
}

/// Read a JSON array of entities.
pub fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read entities from {}", path.display()))?;
    let entities: Vec<Entity> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse entities in {}", path.display()))?;
    if entities.len() < 2 {
        anyhow::bail!("{} contains {} entities; at least 2 are required", path.display(), entities.len());
    }
    Ok(entities)
}

/// Read a JSON array of features.
pub fn load_features(path: &Path) -> Result<Vec<Feature>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read features from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse features in {}", path.display()))
}

/// Seeded RNG when a seed is configured, entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Stop the loop on Ctrl-C; the in-flight iteration finishes first.
pub fn stop_on_ctrl_c(stop: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current iteration");
            stop.stop();
        }
    });
}

/// Run `reflexion` from `state`, drawing progress unless in JSON mode.
pub async fn drive(
    reflexion: ReflexionLoop,
    run_id: Option<uuid::Uuid>,
    entities: &[Entity],
    state: ReflexionState,
    seed: Option<u64>,
    json_mode: bool,
) -> Result<RunSummary> {
    let max_iterations = reflexion.config().max_iterations;
    let start = state.iteration();
    let mut rng = make_rng(seed);
    stop_on_ctrl_c(reflexion.stop_handle());

    let (tx, rx) = mpsc::channel(64);
    let progress = if json_mode {
        drop(rx);
        None
    } else {
        let pb = create_progress_bar(max_iterations as u64, start.min(max_iterations) as u64);
        Some(track_progress(pb, rx))
    };
    let reflexion = reflexion.with_events(tx);

    let result = match run_id {
        Some(run_id) => reflexion.resume(run_id, entities, state, &mut rng).await,
        None => reflexion.run(entities, state, &mut rng).await,
    };
    drop(reflexion);
    if let Some(progress) = progress {
        wait_for_progress(progress).await;
    }

    Ok(result?)
}

/// Wait for the progress task; returns false if it panicked or was cancelled.
async fn wait_for_progress(progress: JoinHandle<()>) -> bool {
    match progress.await {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "progress display task failed");
            false
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummaryOutput {
    pub run_id: String,
    pub iterations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub stopped: bool,
    pub active_features: Vec<Feature>,
    pub rejected_features: Vec<String>,
    pub latest_validation_error: Option<f64>,
}

impl From<&RunSummary> for RunSummaryOutput {
    fn from(summary: &RunSummary) -> Self {
        let latest_validation_error = summary
            .records
            .iter()
            .filter_map(|r| match r.decision {
                Decision::Accepted => r.new_validation_error,
                Decision::Rejected => r.old_validation_error,
                Decision::Skipped { .. } => None,
            })
            .last();

        Self {
            run_id: summary.run_id.to_string(),
            iterations: summary.final_state.iteration(),
            accepted: summary.accepted(),
            rejected: summary.rejected(),
            skipped: summary.skipped(),
            stopped: summary.stopped,
            active_features: summary.final_state.active_features().to_vec(),
            rejected_features: feature_names(summary.final_state.rejected_features()),
            latest_validation_error,
        }
    }
}

impl CommandOutput for RunSummaryOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Run {}", self.run_id),
            format!(
                "Iterations: {} ({} accepted, {} rejected, {} skipped){}",
                self.iterations,
                self.accepted,
                self.rejected,
                self.skipped,
                if self.stopped { " - stopped early" } else { "" }
            ),
            format!("Latest validation error: {}", format_error(self.latest_validation_error)),
            String::new(),
            "Active features:".to_string(),
        ];
        for feature in &self.active_features {
            lines.push(format!("  - {}: {}", feature.name, feature.summary));
        }
        if !self.rejected_features.is_empty() {
            lines.push(String::new());
            lines.push(format!("Rejected: {}", self.rejected_features.join(", ")));
        }
        lines.join("\n")
    }
}
