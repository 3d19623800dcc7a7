//! Command handlers -- one module per subcommand

pub mod alerts;
pub mod config;
pub mod events;
pub mod labels;
pub mod preview;
pub mod rules;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fieldtail_core::config::FieldtailConfig;
use fieldtail_core::error::{ConfigError, FieldtailError};
use fieldtail_log_pipeline::{AdminService, RuleEngine, SqliteStore, StatusBoard, Store};

use crate::error::CliError;

/// Actor name recorded in the audit log for CLI mutations.
pub const ACTOR: &str = "cli";

/// Load the effective configuration.
///
/// A missing file falls back to defaults. Environment overrides apply in
/// both cases, then `db_path` (from `--db-path`) wins over both.
pub async fn load_config(
    config_path: &Path,
    db_path: Option<&str>,
) -> Result<FieldtailConfig, CliError> {
    let mut config = match FieldtailConfig::from_file(config_path).await {
        Ok(config) => config,
        Err(FieldtailError::Config(ConfigError::FileNotFound { .. })) => {
            tracing::debug!(path = %config_path.display(), "config file not found, using defaults");
            FieldtailConfig::default()
        }
        Err(e) => return Err(CliError::Config(e.to_string())),
    };
    config.apply_env_overrides();
    if let Some(db_path) = db_path {
        config.storage.db_path = db_path.to_owned();
    }
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}

/// Open the configured database and wrap it in an [`AdminService`].
pub fn open_admin(config: &FieldtailConfig) -> Result<AdminService, CliError> {
    tracing::debug!(db_path = %config.storage.db_path, "opening store");
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.storage.db_path)?);
    let rules = Arc::new(RuleEngine::new(
        Arc::clone(&store),
        Duration::from_secs(config.rules.reload_secs),
    ));
    // File status lives in the daemon process; the CLI board stays empty.
    Ok(AdminService::new(store, rules, StatusBoard::new()))
}
