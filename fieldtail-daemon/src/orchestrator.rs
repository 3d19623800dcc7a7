//! Daemon orchestration -- assembly, lifecycle management and shutdown.
//!
//! The [`Orchestrator`] is the central coordinator of `fieldtail-daemon`.
//! It validates configuration, opens the store, builds the webhook
//! notifier and the log pipeline, and then runs until a shutdown signal.
//!
//! # Startup
//!
//! 1. Metrics recorder (when enabled)
//! 2. SQLite store and webhook notifier
//! 3. PID file
//! 4. Pipeline start (policy seeding, ingest/alert/retention loops)
//!
//! # Shutdown
//!
//! 1. Background daemon tasks (uptime, health reporter)
//! 2. Pipeline stop (cancellation observed at iteration boundaries)
//! 3. PID file removal

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use fieldtail_core::config::FieldtailConfig;
use fieldtail_core::pipeline::Pipeline;
use fieldtail_log_pipeline::{
    LogPipeline, LogPipelineBuilder, PipelineConfig, SqliteStore, WebhookNotifier,
};

use crate::health::{DaemonHealth, FileCounts, log_health};
use crate::metrics_server;

/// Seconds between health reports.
const HEALTH_REPORT_INTERVAL_SECS: u64 = 30;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: FieldtailConfig,
    /// The log pipeline.
    pipeline: LogPipeline<WebhookNotifier>,
    /// Shutdown broadcast sender (signals daemon background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed or
    /// validated, or if the pipeline cannot be assembled.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = FieldtailConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: FieldtailConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let store = Arc::new(
            SqliteStore::open(&config.storage.db_path)
                .map_err(|e| anyhow::anyhow!("failed to open store: {}", e))?,
        );
        tracing::info!(db_path = %config.storage.db_path, "store opened");

        let notifier = WebhookNotifier::new(
            &config.notifier.webhook_url,
            Duration::from_secs(config.notifier.timeout_secs),
            config.notifier.disabled,
        )
        .map_err(|e| anyhow::anyhow!("failed to build notifier: {}", e))?;
        if !notifier.is_active() {
            tracing::warn!("webhook notifier inactive, alerts will be recorded as FAILED");
        }

        let pipeline = LogPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .store(store)
            .notifier(Arc::new(notifier))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(4);
        tracing::info!("orchestrator initialized");

        Ok(Self {
            config,
            pipeline,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and run until `shutdown` resolves.
    ///
    /// `shutdown` yields the name of the trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = self.config.general.pid_file.clone();
        if !pid_file.is_empty() {
            write_pid_file(Path::new(&pid_file))?;
        }

        if let Err(e) = self.pipeline.start().await {
            tracing::error!(error = %e, "pipeline start failed");
            if !pid_file.is_empty() {
                remove_pid_file(Path::new(&pid_file));
            }
            return Err(e.into());
        }

        let mut tasks = Vec::new();
        if self.config.metrics.enabled {
            tasks.push(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ));
        }

        tracing::info!("fieldtail-daemon running");
        let mut health_ticker =
            tokio::time::interval(Duration::from_secs(HEALTH_REPORT_INTERVAL_SECS));
        health_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = health_ticker.tick() => log_health(&self.health().await),
            }
        };
        match &signal {
            Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
        }

        let _ = self.shutdown_tx.send(());
        for task in tasks {
            let _ = task.await;
        }

        let stopped = self.pipeline.stop().await;
        if !pid_file.is_empty() {
            remove_pid_file(Path::new(&pid_file));
        }
        tracing::info!("fieldtail-daemon shut down");

        stopped?;
        signal.map(|_| ())
    }

    /// Current aggregated health.
    pub async fn health(&self) -> DaemonHealth {
        let broadcast = self.pipeline.broadcast();
        DaemonHealth {
            status: self.pipeline.health_check().await,
            uptime_secs: self.start_time.elapsed().as_secs(),
            files: FileCounts::from_snapshot(&self.pipeline.status().snapshot()),
            subscribers: broadcast.subscriber_count(),
            broadcast_dropped: broadcast.dropped_count(),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &FieldtailConfig {
        &self.config
    }

    /// The managed pipeline.
    pub fn pipeline(&self) -> &LogPipeline<WebhookNotifier> {
        &self.pipeline
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL_C")
}

/// Write the current process PID to a file.
///
/// Fails if the file already exists, which indicates another running
/// instance. The file is created atomically with `create_new`.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;
    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failures are logged, not returned.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use fieldtail_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
