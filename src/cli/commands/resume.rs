//! `reflexion resume`: continue a recorded run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::adapters::mock::{MockEntityScorer, MockFeatureProposer};
use crate::adapters::HttpFeatureService;
use crate::cli::commands::{drive, load_entities, load_features, open_repository, RunSummaryOutput};
use crate::cli::output::output;
use crate::domain::models::{Config, ReflexionState, RunInfo};
use crate::domain::ports::{EntityScorer, FeatureProposer};
use crate::infrastructure::config::ConfigLoader;
use crate::services::ReflexionLoop;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run to continue
    #[arg(short, long)]
    pub run_id: Uuid,

    /// Entities the run was started with
    #[arg(short, long)]
    pub entities: PathBuf,

    /// Initial features, used only when the run has no recorded iteration yet
    #[arg(short, long)]
    pub features: Option<PathBuf>,

    /// New total iteration budget (defaults to the run's original budget)
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Use mock collaborators (the run store is still the configured database)
    #[arg(long)]
    pub dry_run: bool,
}

/// State to continue `run` from.
///
/// Runs interrupted before their first iteration have no recorded state;
/// they restart at iteration 0 from `features`.
fn resume_point(run: &RunInfo, latest: Option<ReflexionState>, features: Option<&Path>) -> Result<ReflexionState> {
    if let Some(state) = latest {
        return Ok(state);
    }

    let path = features.with_context(|| {
        format!(
            "Run {} has no recorded iterations; pass --features with its initial feature set to restart it",
            run.id
        )
    })?;
    let features = load_features(path)?;
    if features.len() != run.feature_count {
        anyhow::bail!(
            "Run {} was started with {} features, {} given",
            run.id,
            run.feature_count,
            features.len()
        );
    }
    ReflexionState::new(features).context("Invalid initial feature set")
}

pub async fn execute(args: ResumeArgs, mut config: Config, json_mode: bool) -> Result<()> {
    let repository = open_repository(&config).await?;
    let run = repository
        .get_run(args.run_id)
        .await?
        .with_context(|| format!("Run {} not found", args.run_id))?;
    let latest = repository.latest_state(args.run_id).await?;
    let state = resume_point(&run, latest, args.features.as_deref())?;

    config.reflexion.max_iterations = args.iterations.unwrap_or(run.max_iterations);
    ConfigLoader::validate(&config)?;
    if state.iteration() >= config.reflexion.max_iterations {
        anyhow::bail!(
            "Run {} already completed {} of {} iterations; raise --iterations to continue",
            run.id,
            state.iteration(),
            config.reflexion.max_iterations
        );
    }

    let entities = load_entities(&args.entities)?;
    let (proposer, scorer) = if args.dry_run {
        let proposer: Arc<dyn FeatureProposer> = Arc::new(MockFeatureProposer::sequential("resumed"));
        let scorer: Arc<dyn EntityScorer> = Arc::new(MockEntityScorer::hashed());
        (proposer, scorer)
    } else {
        let service = Arc::new(
            HttpFeatureService::from_service_config(&config.service)
                .context("Failed to configure feature service client")?,
        );
        let proposer: Arc<dyn FeatureProposer> = service.clone();
        let scorer: Arc<dyn EntityScorer> = service;
        (proposer, scorer)
    };

    // Offset the seed so a resumed run does not replay the splits already used
    let seed = run
        .seed
        .or(config.reflexion.seed)
        .map(|seed| seed.wrapping_add(state.iteration() as u64));

    let reflexion = ReflexionLoop::from_config(proposer, scorer, &config).with_repository(repository);
    let summary = drive(reflexion, Some(run.id), &entities, state, seed, json_mode).await?;

    output(&RunSummaryOutput::from(&summary), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Feature;
    use std::io::Write;

    fn features_file(names: &[&str]) -> tempfile::NamedTempFile {
        let features: Vec<Feature> = names.iter().map(|n| Feature::new(*n, "", "")).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&features).unwrap()).unwrap();
        file
    }

    #[test]
    fn test_resume_point_prefers_recorded_state() {
        let run = RunInfo::new(10, 1, 5, None);
        let recorded = ReflexionState::restore(vec![Feature::new("a", "", "")], vec![], 3).unwrap();
        let state = resume_point(&run, Some(recorded.clone()), None).unwrap();
        assert_eq!(state, recorded);
    }

    #[test]
    fn test_resume_point_restarts_unrecorded_run_from_features() {
        let run = RunInfo::new(10, 2, 5, None);
        let file = features_file(&["a", "b"]);

        let state = resume_point(&run, None, Some(file.path())).unwrap();
        assert_eq!(state.iteration(), 0);
        assert_eq!(state.cardinality(), 2);
    }

    #[test]
    fn test_resume_point_requires_matching_features() {
        let run = RunInfo::new(10, 2, 5, None);
        assert!(resume_point(&run, None, None).is_err());

        let file = features_file(&["a"]);
        assert!(resume_point(&run, None, Some(file.path())).is_err());
    }
}
