//! Reflexion CLI entry point.

use clap::Parser;

use reflexion::cli::{commands, handle_error, load_config, Cli, Commands};
use reflexion::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cli.json).await,
        Commands::Resume(args) => commands::resume::execute(args, config, cli.json).await,
        Commands::History(args) => commands::history::execute(args, config, cli.json).await,
        Commands::Config(args) => commands::config::execute(&args, config, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
