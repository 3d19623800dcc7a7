//! Daemon health reporting.
//!
//! Combines the pipeline's own [`HealthStatus`] with a per-status count of
//! tracked files and broadcast counters into a single [`DaemonHealth`]
//! report, which the orchestrator logs periodically.

use std::collections::BTreeMap;

use serde::Serialize;

use fieldtail_core::pipeline::HealthStatus;
use fieldtail_core::types::FileStatus;
use fieldtail_log_pipeline::collector::FileStatusEntry;

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Pipeline health status.
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Tracked files per status.
    pub files: FileCounts,
    /// Live event subscribers.
    pub subscribers: usize,
    /// Events evicted from the broadcast buffer since start.
    pub broadcast_dropped: u64,
}

/// Number of tracked files in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    /// Read new data on the last pass.
    pub ok: usize,
    /// No new data on the last pass.
    pub idle: usize,
    /// Could not be opened or stat'ed.
    pub missing: usize,
}

impl FileCounts {
    /// Count entries of a file status snapshot.
    pub fn from_snapshot(snapshot: &BTreeMap<String, FileStatusEntry>) -> Self {
        snapshot
            .values()
            .fold(Self::default(), |mut counts, entry| {
                match entry.status {
                    FileStatus::Ok => counts.ok += 1,
                    FileStatus::Idle => counts.idle += 1,
                    FileStatus::Missing => counts.missing += 1,
                }
                counts
            })
    }

    /// Total tracked files.
    pub fn total(&self) -> usize {
        self.ok + self.idle + self.missing
    }
}

/// Log a health report at a level matching its status.
pub fn log_health(health: &DaemonHealth) {
    match &health.status {
        HealthStatus::Healthy => tracing::debug!(
            uptime_secs = health.uptime_secs,
            files = health.files.total(),
            subscribers = health.subscribers,
            "daemon healthy"
        ),
        HealthStatus::Degraded(reason) => tracing::warn!(
            reason = %reason,
            missing = health.files.missing,
            "daemon degraded"
        ),
        HealthStatus::Unhealthy(reason) => tracing::error!(reason = %reason, "daemon unhealthy"),
    }
}

#[cfg(test)]
mod tests {
    use fieldtail_log_pipeline::collector::StatusBoard;

    use super::*;

    fn entry(status: FileStatus) -> FileStatusEntry {
        let board = StatusBoard::new();
        board.set("/x", status, chrono::Utc::now());
        board.get("/x").unwrap()
    }

    #[test]
    fn counts_each_status() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("/a".to_owned(), entry(FileStatus::Ok));
        snapshot.insert("/b".to_owned(), entry(FileStatus::Missing));
        snapshot.insert("/c".to_owned(), entry(FileStatus::Missing));
        snapshot.insert("/d".to_owned(), entry(FileStatus::Idle));

        let counts = FileCounts::from_snapshot(&snapshot);
        assert_eq!(
            counts,
            FileCounts {
                ok: 1,
                idle: 1,
                missing: 2
            }
        );
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn health_serializes() {
        let health = DaemonHealth {
            status: HealthStatus::Healthy,
            uptime_secs: 3,
            files: FileCounts::default(),
            subscribers: 0,
            broadcast_dropped: 0,
        };
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"]["state"], "healthy");
        assert_eq!(json["files"]["missing"], 0);
    }
}
