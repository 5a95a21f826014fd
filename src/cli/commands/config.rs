//! `reflexion config`: print the effective configuration.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the API key instead of masking it
    #[arg(long)]
    pub show_secrets: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    pub config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }
}

pub fn execute(args: &ConfigArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if !args.show_secrets && config.service.api_key.is_some() {
        config.service.api_key = Some("********".to_string());
    }
    output(&ConfigOutput { config }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_output_is_yaml() {
        let rendered = ConfigOutput {
            config: Config::default(),
        }
        .to_human();
        assert!(rendered.contains("max_iterations: 10"));
        assert!(rendered.contains("target_transform: log1p"));
    }
}
