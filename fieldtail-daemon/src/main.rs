use std::path::Path;

use anyhow::Result;
use clap::Parser;

use fieldtail_core::config::FieldtailConfig;
use fieldtail_core::error::{ConfigError, FieldtailError};
use fieldtail_daemon::orchestrator::Orchestrator;

mod cli;
mod logging;

use cli::DaemonCli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = load_config(&cli.config).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(config = %cli.config.display(), "fieldtail-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}

/// Load the config file, falling back to defaults when it does not exist.
///
/// Environment overrides apply in both cases.
async fn load_config(path: &Path) -> Result<FieldtailConfig> {
    let mut config = match FieldtailConfig::from_file(path).await {
        Ok(config) => config,
        Err(FieldtailError::Config(ConfigError::FileNotFound { .. })) => {
            eprintln!(
                "config file {} not found, using defaults",
                path.display()
            );
            FieldtailConfig::default()
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };
    config.apply_env_overrides();
    Ok(config)
}
