//! Command-line interface.

pub mod commands;
pub mod display;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

use commands::config::ConfigArgs;
use commands::history::HistoryArgs;
use commands::resume::ResumeArgs;
use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "reflexion")]
#[command(about = "Reflexion - iterative feature discovery for linear models", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .reflexion/config.yaml and .reflexion/local.yaml)
    #[arg(short, long, global = true, env = "REFLEXION_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new Reflexion run
    Run(RunArgs),
    /// Continue a recorded run from its last iteration
    Resume(ResumeArgs),
    /// Show recorded runs or the iterations of one run
    History(HistoryArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Load configuration from `path`, or from the project hierarchy when unset.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Report a command failure and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1);
}
