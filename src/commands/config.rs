//! Config command handler

use super::CommandContext;
use crate::cli::{ConfigArgs, ConfigOperation};
use crate::config::EngineConfig;
use crate::error::{Result, ScoringError};

/// Run the config command
pub fn run_config(args: &ConfigArgs, ctx: &CommandContext) -> Result<String> {
    match &args.operation {
        ConfigOperation::Show { path } => {
            let config = EngineConfig::load_from(path)?;
            if ctx.is_json() {
                Ok(format!("{}\n", serde_json::to_string_pretty(&config)?))
            } else {
                toml::to_string_pretty(&config).map_err(|e| ScoringError::Config {
                    message: format!("Failed to serialize config: {}", e),
                })
            }
        }
        ConfigOperation::Init { path, force } => {
            if path.exists() && !force {
                return Err(ScoringError::Config {
                    message: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }
            EngineConfig::default().save_to(path)?;
            Ok(format!("Wrote {}\n", path.display()))
        }
    }
}
