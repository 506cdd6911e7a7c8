//! Scheduler counters and the stats snapshot returned by `get_stats`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::telemetry::metrics::SchedulerMetrics;

/// Lock-free counters updated by the facade and the worker loops.
///
/// Every update is mirrored to the `metrics` facade so dashboards see the
/// same numbers as `get_stats`.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    retried: AtomicU64,
    timed_out: AtomicU64,
    internal_errors: AtomicU64,
    running: AtomicUsize,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        SchedulerMetrics::task_submitted();
    }

    /// Count a task as executing until the returned guard is dropped.
    ///
    /// The guard also fires when a worker loop is aborted mid-task.
    pub fn track_running(self: &Arc<Self>) -> RunningGuard {
        let running = self.running.fetch_add(1, Ordering::Relaxed) + 1;
        SchedulerMetrics::set_running(running);
        RunningGuard {
            stats: Arc::clone(self),
        }
    }

    pub fn record_completed(&self, duration_ms: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        SchedulerMetrics::task_settled("completed", duration_ms);
    }

    /// Terminal failure. Timeouts count here too, and additionally in `timed_out`.
    pub fn record_failed(&self, timed_out: bool, duration_ms: u64) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        }
        SchedulerMetrics::task_settled(if timed_out { "timed_out" } else { "failed" }, duration_ms);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        SchedulerMetrics::task_retried();
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        SchedulerMetrics::task_cancelled();
    }

    pub fn record_internal_error(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
        SchedulerMetrics::internal_error();
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn internal_errors(&self) -> u64 {
        self.internal_errors.load(Ordering::Relaxed)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }
}

/// Decrements the running gauge on drop.
#[derive(Debug)]
pub struct RunningGuard {
    stats: Arc<SchedulerStats>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let running = self
            .stats
            .running
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        SchedulerMetrics::set_running(running);
    }
}

/// Point-in-time view of the scheduler.
///
/// Fields are read from independently protected regions (atomics, the
/// ordering store, the task table) without a global barrier, so values may
/// be mutually inconsistent by a few in-flight tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retried: u64,
    pub timed_out: u64,
    pub internal_errors: u64,
    /// Entries in the ordering store
    pub queue_size: usize,
    /// Tasks currently executing
    pub running: usize,
    /// Tasks in `Pending` status in the task table
    pub pending: usize,
    pub max_workers: usize,
    /// Worker loops currently alive
    pub active_workers: usize,
}

impl StatsSnapshot {
    /// Completed share of settled tasks, as a percentage.
    pub fn success_rate(&self) -> f64 {
        let settled = self.completed + self.failed;
        if settled == 0 {
            100.0
        } else {
            (self.completed as f64 / settled as f64) * 100.0
        }
    }

    /// Share of workers currently executing a task, as a percentage.
    pub fn utilization(&self) -> f64 {
        if self.max_workers == 0 {
            return 0.0;
        }
        (self.running as f64 / self.max_workers as f64) * 100.0
    }
}
