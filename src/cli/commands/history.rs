//! `reflexion history`: inspect recorded runs.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::commands::open_repository;
use crate::cli::display::{list_table, render_list};
use crate::cli::output::{format_error, output, truncate, CommandOutput};
use crate::domain::models::feature::feature_names;
use crate::domain::models::{Config, IterationRecord, RunInfo};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Show the iterations of this run instead of the run list
    #[arg(short, long)]
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RunListOutput {
    pub runs: Vec<RunInfo>,
    pub total: usize,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "started", "entities", "features", "budget", "seed"]);
        for run in &self.runs {
            table.add_row(vec![
                run.id.to_string(),
                run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                run.entity_count.to_string(),
                run.feature_count.to_string(),
                run.max_iterations.to_string(),
                run.seed.map_or_else(|| "-".to_string(), |s| s.to_string()),
            ]);
        }
        render_list("run", &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct IterationListOutput {
    pub run: RunInfo,
    pub iterations: Vec<IterationRecord>,
}

impl CommandOutput for IterationListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "decision", "dropped", "candidate", "old error", "new error", "active"]);
        for record in &self.iterations {
            table.add_row(vec![
                record.iteration.to_string(),
                record.decision.to_string(),
                record.dropped_feature.clone().unwrap_or_else(|| "-".to_string()),
                record
                    .candidate_feature
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |f| truncate(&f.name, 24)),
                format_error(record.old_validation_error),
                format_error(record.new_validation_error),
                feature_names(record.state.active_features()).join(", "),
            ]);
        }
        format!(
            "Run {} ({} entities, budget {})\n{}",
            self.run.id,
            self.run.entity_count,
            self.run.max_iterations,
            render_list("iteration", &table, self.iterations.len())
        )
    }
}

pub async fn execute(args: HistoryArgs, config: Config, json_mode: bool) -> Result<()> {
    let repository = open_repository(&config).await?;

    match args.run_id {
        Some(run_id) => {
            let run = repository
                .get_run(run_id)
                .await?
                .with_context(|| format!("Run {run_id} not found"))?;
            let iterations = repository.list_iterations(run_id).await?;
            output(&IterationListOutput { run, iterations }, json_mode);
        }
        None => {
            let runs = repository.list_runs().await?;
            let total = runs.len();
            output(&RunListOutput { runs, total }, json_mode);
        }
    }
    Ok(())
}
