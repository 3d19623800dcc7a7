//! CLI argument definitions for fieldtail-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use fieldtail_core::config::FieldtailConfig;

/// fieldtail log ingestion and alerting daemon.
///
/// Tails device log files, stores parsed events and raises
/// cooldown-throttled webhook alerts.
#[derive(Parser, Debug)]
#[command(name = "fieldtail-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to fieldtail.toml configuration file.
    ///
    /// A missing file is not an error: defaults and environment
    /// variables are used instead.
    #[arg(short, long, default_value = "fieldtail.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the directory that holds the tailed log files.
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Override the SQLite database path.
    #[arg(long)]
    pub db_path: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut FieldtailConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.ingest.log_dir = dir.clone();
        }
        if let Some(db) = &self.db_path {
            config.storage.db_path = db.clone();
        }
        if let Some(pid) = &self.pid_file {
            config.general.pid_file = pid.clone();
        }
    }
}
