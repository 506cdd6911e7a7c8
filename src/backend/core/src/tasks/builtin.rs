//! Built-in maintenance work.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Weak;

use super::{TaskScheduler, Work, WorkError, WorkResult};
use crate::error::VigilError;

/// Emits a liveness record. Useful as a canary that the pool is draining.
#[derive(Debug, Clone)]
pub struct HeartbeatWork {
    pub source: String,
}

impl HeartbeatWork {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl Work for HeartbeatWork {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn run(&self) -> WorkResult {
        tracing::debug!(source = %self.source, "Heartbeat");
        Ok(serde_json::json!({
            "source": self.source,
            "at": Utc::now(),
        }))
    }
}

/// Snapshots the scheduler's stats and logs them.
///
/// Holds a weak reference so a queued report never keeps its scheduler alive.
#[derive(Debug, Clone)]
pub struct StatsReportWork {
    scheduler: Weak<TaskScheduler>,
}

impl StatsReportWork {
    pub fn new(scheduler: Weak<TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Work for StatsReportWork {
    fn name(&self) -> &str {
        "stats_report"
    }

    async fn run(&self) -> WorkResult {
        let scheduler = self
            .scheduler
            .upgrade()
            .ok_or_else(|| WorkError::new("scheduler no longer exists"))?;
        let stats = scheduler.get_stats();

        tracing::info!(
            scheduler = %scheduler.config().name,
            submitted = stats.submitted,
            completed = stats.completed,
            failed = stats.failed,
            retried = stats.retried,
            queue_size = stats.queue_size,
            running = stats.running,
            success_rate = stats.success_rate(),
            "Scheduler stats"
        );

        serde_json::to_value(&stats).map_err(|e| WorkError::from(VigilError::from(e)))
    }
}

/// Checks that a path (spool directory, log file) is present.
#[derive(Debug, Clone)]
pub struct PathProbeWork {
    pub path: PathBuf,
}

impl PathProbeWork {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Work for PathProbeWork {
    fn name(&self) -> &str {
        "path_probe"
    }

    async fn run(&self) -> WorkResult {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            WorkError::new(format!("{}: {}", self.path.display(), e)).with_code("E_PROBE")
        })?;

        Ok(serde_json::json!({
            "path": self.path.display().to_string(),
            "is_dir": metadata.is_dir(),
            "bytes": metadata.len(),
        }))
    }
}
