//! `reflexion run`: start a new feature discovery run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::cli::commands::{drive, load_entities, load_features, Collaborators, RunSummaryOutput};
use crate::cli::output::output;
use crate::domain::models::{Config, ReflexionState};
use crate::infrastructure::config::ConfigLoader;
use crate::services::ReflexionLoop;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON array of entities: {id, target, covariates?, content?}
    #[arg(short, long)]
    pub entities: PathBuf,

    /// JSON array of initial features: {name, summary?, description}
    #[arg(short, long, conflicts_with = "bootstrap", required_unless_present = "bootstrap")]
    pub features: Option<PathBuf>,

    /// Ask the feature service for this many initial features instead
    #[arg(short, long)]
    pub bootstrap: Option<usize>,

    /// Iteration budget (overrides reflexion.max_iterations)
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Shuffle seed (overrides reflexion.seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use deterministic mock collaborators and keep nothing on disk
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if let Some(iterations) = args.iterations {
        config.reflexion.max_iterations = iterations;
    }
    if args.seed.is_some() {
        config.reflexion.seed = args.seed;
    }
    ConfigLoader::validate(&config)?;

    let entities = load_entities(&args.entities)?;
    let collaborators = if args.dry_run {
        Collaborators::dry_run()
    } else {
        Collaborators::live(&config).await?
    };

    let features = match (&args.features, args.bootstrap) {
        (Some(path), _) => load_features(path)?,
        (None, Some(count)) => {
            if count == 0 {
                anyhow::bail!("--bootstrap needs at least one feature");
            }
            info!(count, "bootstrapping initial features");
            collaborators
                .bootstrapper
                .bootstrap_features(&entities, count)
                .await
                .context("Failed to bootstrap initial features")?
        }
        (None, None) => anyhow::bail!("either --features or --bootstrap is required"),
    };
    let state = ReflexionState::new(features).context("Invalid initial feature set")?;

    let reflexion = ReflexionLoop::from_config(collaborators.proposer, collaborators.scorer, &config)
        .with_repository(collaborators.repository);
    let summary = drive(reflexion, None, &entities, state, config.reflexion.seed, json_mode).await?;

    output(&RunSummaryOutput::from(&summary), json_mode);
    Ok(())
}
