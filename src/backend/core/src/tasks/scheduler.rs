//! Task scheduler facade.
//!
//! `TaskScheduler` owns the task table, the ordering store, the stats and the
//! worker pool. Producers call `submit` and get a `TaskId` back immediately;
//! the worker loops claim from the ordering store in priority order.
//!
//! Lock order: the ordering store mutex is always taken before a task table
//! entry. Every compound operation (submit, claim, cancel, requeue) follows it,
//! which makes claim and cancel atomic with respect to each other.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::queue::PriorityStore;
use super::retry::{FailureKind, RetryDecision, RetryPolicy};
use super::stats::{RunningGuard, SchedulerStats, StatsSnapshot};
use super::task::{TaskId, TaskPriority, TaskRecord, TaskStatus, TaskWork, WorkResult};
use super::worker::WorkerPool;
use crate::error::{Result, VigilError};
use crate::telemetry::metrics::SchedulerMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler name (for logging/metrics)
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of worker loops, and the admission gate size
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Capacity of the ordering store (0 = unbounded)
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Per-attempt deadline when the submitter gives none
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Retry budget when the submitter gives none
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Sleep between claims while the ordering store is empty
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Sleep after an internal worker fault
    #[serde(with = "humantime_serde", default = "default_error_backoff")]
    pub error_backoff: Duration,
    /// Pause before a failed attempt becomes claimable again
    #[serde(with = "humantime_serde", default)]
    pub retry_delay: Duration,
}

fn default_name() -> String {
    "vigil-scheduler".to_string()
}

fn default_max_workers() -> usize {
    5
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_error_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_workers: default_max_workers(),
            max_queue_size: default_max_queue_size(),
            default_timeout_ms: default_timeout_ms(),
            default_max_retries: default_max_retries(),
            poll_interval: default_poll_interval(),
            error_backoff: default_error_backoff(),
            retry_delay: Duration::ZERO,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(VigilError::invalid_configuration(
                "scheduler.max_workers must be at least 1",
            ));
        }
        if self.default_timeout_ms == 0 {
            return Err(VigilError::invalid_configuration(
                "scheduler.default_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_delay)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Submission options
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-task overrides for `submit`. Unset fields take the scheduler defaults.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub name: Option<String>,
    pub priority: TaskPriority,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// What `stop` left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOutcome {
    /// The store was empty and nothing was running when the loops were stopped
    pub drained: bool,
    /// Tasks left `Pending`
    pub abandoned_pending: usize,
    /// Tasks left `Running` when their loop was aborted
    pub abandoned_running: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shared core
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordering store entry. The record itself stays in the task table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedTask {
    id: TaskId,
    priority: TaskPriority,
    created_at: DateTime<Utc>,
    sequence: u64,
}

impl From<&TaskRecord> for QueuedTask {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            priority: record.priority,
            created_at: record.created_at,
            sequence: record.sequence,
        }
    }
}

type QueueKey = (u8, DateTime<Utc>, u64);

fn queue_key(task: &QueuedTask) -> QueueKey {
    (task.priority.rank(), task.created_at, task.sequence)
}

/// Transient handle a worker holds while executing a task.
///
/// Counts as running from the moment of the claim until it is dropped.
#[derive(Debug)]
pub(crate) struct ClaimedTask {
    pub id: TaskId,
    pub name: String,
    pub work: TaskWork,
    pub priority: TaskPriority,
    pub timeout_ms: u64,
    pub attempt: u32,
    _running: RunningGuard,
}

/// State shared between the facade and the worker loops.
pub(crate) struct SchedulerCore {
    pub(crate) config: SchedulerConfig,
    pub(crate) stats: Arc<SchedulerStats>,
    retry_policy: RetryPolicy,
    store: Mutex<PriorityStore<QueuedTask, QueueKey>>,
    tasks: DashMap<TaskId, TaskRecord>,
    sequence: AtomicU64,
    accepting: AtomicBool,
}

impl SchedulerCore {
    fn new(config: SchedulerConfig) -> Self {
        Self {
            retry_policy: config.retry_policy(),
            store: Mutex::new(PriorityStore::new(config.max_queue_size, queue_key)),
            tasks: DashMap::new(),
            stats: Arc::new(SchedulerStats::new()),
            sequence: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
            config,
        }
    }

    fn submit(&self, work: TaskWork, options: SubmitOptions) -> Result<TaskId> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(VigilError::scheduler_stopped(&self.config.name));
        }
        if options.timeout_ms == Some(0) {
            return Err(VigilError::invalid_configuration(
                "task timeout_ms must be greater than zero",
            ));
        }

        let mut store = self.store.lock();
        let record = TaskRecord::new(
            work,
            options.name,
            options.priority,
            options.timeout_ms.unwrap_or(self.config.default_timeout_ms),
            options.max_retries.unwrap_or(self.config.default_max_retries),
            self.sequence.fetch_add(1, Ordering::Relaxed),
        );
        let id = record.id;

        // Workers cannot pop until the store lock is released, so the table
        // insert after the push is never observed out of order.
        store.push(QueuedTask::from(&record))?;
        tracing::debug!(
            task_id = %id,
            task_name = %record.name,
            priority = %record.priority,
            timeout_ms = record.timeout_ms,
            max_retries = record.max_retries,
            "Task submitted"
        );
        self.tasks.insert(id, record);
        let depth = store.len();
        drop(store);

        self.stats.record_submitted();
        SchedulerMetrics::set_queue_depth(depth);
        Ok(id)
    }

    /// Pop the highest-priority entry and mark it `Running`.
    pub(crate) fn claim_next(&self) -> Result<Option<ClaimedTask>> {
        let mut store = self.store.lock();
        let Some(queued) = store.pop_highest() else {
            return Ok(None);
        };
        SchedulerMetrics::set_queue_depth(store.len());

        let mut record = self
            .tasks
            .get_mut(&queued.id)
            .ok_or_else(|| VigilError::task_not_found(queued.id))?;
        record.mark_running()?;

        Ok(Some(ClaimedTask {
            id: record.id,
            name: record.name.clone(),
            work: record.work.clone(),
            priority: record.priority,
            timeout_ms: record.timeout_ms,
            attempt: record.attempts,
            _running: self.stats.track_running(),
        }))
    }

    pub(crate) fn finish_success(
        &self,
        claim: &ClaimedTask,
        value: serde_json::Value,
        duration_ms: u64,
    ) -> Result<()> {
        let mut record = self
            .tasks
            .get_mut(&claim.id)
            .ok_or_else(|| VigilError::task_not_found(claim.id))?;
        record.mark_completed(value, duration_ms)?;
        drop(record);

        self.stats.record_completed(duration_ms);
        Ok(())
    }

    /// Apply the retry policy to a failed attempt.
    ///
    /// A requeue with a non-zero `retry_delay` flips the record back to
    /// `Pending` at once but only re-enters the store after the delay.
    pub(crate) fn finish_failure(
        self: &Arc<Self>,
        claim: &ClaimedTask,
        failure: FailureKind,
        duration_ms: u64,
    ) -> Result<RetryDecision> {
        let mut store = self.store.lock();
        let mut record = self
            .tasks
            .get_mut(&claim.id)
            .ok_or_else(|| VigilError::task_not_found(claim.id))?;

        let decision = self.retry_policy.decide(
            record.retry_count,
            record.max_retries,
            &failure,
            record.timeout_ms,
        );

        match &decision {
            RetryDecision::Requeue => {
                record.requeue()?;
                let queued = QueuedTask::from(&*record);
                drop(record);

                let delay = self.retry_policy.retry_delay;
                if delay.is_zero() {
                    store.push_unbounded(queued);
                    SchedulerMetrics::set_queue_depth(store.len());
                } else {
                    let core = Arc::clone(self);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        core.enqueue_delayed_retry(queued);
                    });
                }
                self.stats.record_retried();
            }
            RetryDecision::Terminate { status, error } => {
                match status {
                    TaskStatus::TimedOut => record.mark_timed_out(error.as_str(), duration_ms)?,
                    TaskStatus::Failed => record.mark_failed(error.as_str(), duration_ms)?,
                    other => {
                        return Err(VigilError::internal(format!(
                            "retry policy produced non-failure terminal status {}",
                            other
                        )))
                    }
                }
                drop(record);
                self.stats
                    .record_failed(*status == TaskStatus::TimedOut, duration_ms);
            }
        }

        Ok(decision)
    }

    /// Push a delayed retry, unless it was cancelled while waiting.
    fn enqueue_delayed_retry(&self, queued: QueuedTask) {
        let mut store = self.store.lock();
        let still_pending = self
            .tasks
            .get(&queued.id)
            .map(|record| record.status == TaskStatus::Pending)
            .unwrap_or(false);
        if still_pending {
            store.push_unbounded(queued);
            SchedulerMetrics::set_queue_depth(store.len());
        }
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut store = self.store.lock();
        let Some(mut record) = self.tasks.get_mut(&id) else {
            return false;
        };
        if record.status != TaskStatus::Pending {
            return false;
        }
        if let Err(err) = record.mark_cancelled() {
            err.log();
            return false;
        }
        drop(record);

        store.remove_where(|queued| queued.id == id);
        SchedulerMetrics::set_queue_depth(store.len());
        drop(store);

        self.stats.record_cancelled();
        tracing::debug!(task_id = %id, "Task cancelled");
        true
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.store.lock().len()
    }

    /// Nothing queued, nothing executing, and no retry waiting out its delay.
    pub(crate) fn is_idle(&self) -> bool {
        self.queue_len() == 0
            && self.stats.running() == 0
            && self.count_status(TaskStatus::Pending) == 0
    }

    fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Facade
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process priority task scheduler.
///
/// Construct one per process and share it through `Arc`. `start` must be
/// called from within a tokio runtime.
pub struct TaskScheduler {
    core: Arc<SchedulerCore>,
    pool: WorkerPool,
}

impl TaskScheduler {
    /// Create a scheduler. No worker runs until `start` is called.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let core = Arc::new(SchedulerCore::new(config));
        let pool = WorkerPool::new(Arc::clone(&core));

        tracing::info!(
            scheduler = %core.config.name,
            max_workers = core.config.max_workers,
            max_queue_size = core.config.max_queue_size,
            "Task scheduler created"
        );

        Ok(Self { core, pool })
    }

    /// Create a scheduler with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(SchedulerConfig::default())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    /// Spawn the worker loops. Returns `false` if they are already running.
    pub fn start(&self) -> bool {
        self.core.accepting.store(true, Ordering::Release);
        self.pool.start()
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Queue work and return its id without waiting for execution.
    ///
    /// Fails with `QueueFull` when the ordering store is at capacity and with
    /// `SchedulerStopped` once `stop` has begun.
    pub fn submit(&self, work: TaskWork, options: SubmitOptions) -> Result<TaskId> {
        self.core.submit(work, options)
    }

    /// Queue a closure with default options.
    pub fn submit_fn<F, Fut>(&self, name: impl Into<String>, func: F) -> Result<TaskId>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = WorkResult> + Send + 'static,
    {
        self.submit(TaskWork::from_fn(name, func), SubmitOptions::default())
    }

    /// Cancel a task that has not been claimed yet.
    ///
    /// Returns `false` for running, settled and unknown tasks.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.core.cancel(id)
    }

    pub fn get_task(&self, id: TaskId) -> Option<TaskRecord> {
        self.core.tasks.get(&id).map(|record| record.clone())
    }

    pub fn get_task_status(&self, id: TaskId) -> Option<TaskStatus> {
        self.core.tasks.get(&id).map(|record| record.status)
    }

    /// Snapshot of every known task, optionally filtered, in submission order.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self
            .core
            .tasks
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.status == s))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|record| record.sequence);
        tasks
    }

    /// Poll until the task settles or `timeout` elapses, returning the latest
    /// snapshot. `None` for unknown ids.
    pub async fn wait_for(&self, id: TaskId, timeout: Duration) -> Option<TaskRecord> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let record = self.get_task(id)?;
            let remaining = time_left(deadline);
            if record.status.is_terminal() || remaining == Some(Duration::ZERO) {
                return Some(record);
            }
            tokio::time::sleep(self.poll_pause(remaining)).await;
        }
    }

    /// Current counters and gauges.
    pub fn get_stats(&self) -> StatsSnapshot {
        let stats = &self.core.stats;
        StatsSnapshot {
            submitted: stats.submitted(),
            completed: stats.completed(),
            failed: stats.failed(),
            cancelled: stats.cancelled(),
            retried: stats.retried(),
            timed_out: stats.timed_out(),
            internal_errors: stats.internal_errors(),
            queue_size: self.core.queue_len(),
            running: stats.running(),
            pending: self.core.count_status(TaskStatus::Pending),
            max_workers: self.core.config.max_workers,
            active_workers: self.pool.live_workers(),
        }
    }

    /// Stop accepting work and shut the worker loops down.
    ///
    /// With `wait`, polls until the store is empty and nothing is running, or
    /// until `timeout`. Whatever is left is abandoned in its current status.
    pub async fn stop(&self, wait: bool, timeout: Duration) -> StopOutcome {
        self.core.accepting.store(false, Ordering::Release);

        if wait && self.pool.is_running() {
            let deadline = Instant::now().checked_add(timeout);
            while !self.core.is_idle() {
                let remaining = time_left(deadline);
                if remaining == Some(Duration::ZERO) {
                    break;
                }
                tokio::time::sleep(self.poll_pause(remaining)).await;
            }
        }
        let drained = self.core.is_idle();

        self.pool.shutdown().await;

        let outcome = StopOutcome {
            drained,
            abandoned_pending: self.core.count_status(TaskStatus::Pending),
            abandoned_running: self.core.count_status(TaskStatus::Running),
        };

        if outcome.drained {
            tracing::info!(scheduler = %self.core.config.name, "Task scheduler stopped");
        } else {
            tracing::warn!(
                scheduler = %self.core.config.name,
                abandoned_pending = outcome.abandoned_pending,
                abandoned_running = outcome.abandoned_running,
                "Task scheduler stopped with work outstanding"
            );
        }

        outcome
    }
}

impl TaskScheduler {
    fn poll_pause(&self, remaining: Option<Duration>) -> Duration {
        let poll = self.core.config.poll_interval;
        remaining.map_or(poll, |left| poll.min(left))
    }
}

/// Time left before `deadline`. A timeout too large to represent as an
/// instant has no deadline.
fn time_left(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("name", &self.core.config.name)
            .field("running", &self.is_running())
            .field("tasks", &self.core.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn noop() -> TaskWork {
        TaskWork::from_fn("noop", || async { Ok(serde_json::Value::Null) })
    }

    #[test]
    fn test_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.default_timeout_ms, 300_000);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.error_backoff, Duration::from_secs(1));
        assert!(config.retry_delay.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let err = SchedulerConfig::default()
            .with_max_workers(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);

        let config = SchedulerConfig {
            default_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(TaskScheduler::new(config).is_err());
    }

    #[test]
    fn test_submit_applies_defaults() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let id = scheduler.submit(noop(), SubmitOptions::default()).unwrap();

        let record = scheduler.get_task(id).unwrap();
        assert_eq!(record.name, "noop");
        assert_eq!(record.priority, TaskPriority::Normal);
        assert_eq!(record.timeout_ms, 300_000);
        assert_eq!(record.max_retries, 3);
        assert_eq!(record.status, TaskStatus::Pending);
    }

    #[test]
    fn test_claim_follows_priority_then_fifo() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let low = scheduler
            .submit(noop(), SubmitOptions::new().priority(TaskPriority::Low))
            .unwrap();
        let normal_a = scheduler.submit(noop(), SubmitOptions::new()).unwrap();
        let normal_b = scheduler.submit(noop(), SubmitOptions::new()).unwrap();
        let critical = scheduler
            .submit(noop(), SubmitOptions::new().priority(TaskPriority::Critical))
            .unwrap();

        let order: Vec<TaskId> = std::iter::from_fn(|| scheduler.core.claim_next().unwrap())
            .map(|claim| claim.id)
            .collect();
        assert_eq!(order, vec![critical, normal_a, normal_b, low]);
        assert_eq!(scheduler.get_task_status(low), Some(TaskStatus::Running));
    }

    #[test]
    fn test_cancel_only_pending() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let first = scheduler.submit(noop(), SubmitOptions::new()).unwrap();
        let second = scheduler.submit(noop(), SubmitOptions::new()).unwrap();

        let claim = scheduler.core.claim_next().unwrap().unwrap();
        assert_eq!(claim.id, first);
        assert!(!scheduler.cancel(first));

        assert!(scheduler.cancel(second));
        assert!(!scheduler.cancel(second));
        assert_eq!(scheduler.get_task_status(second), Some(TaskStatus::Cancelled));
        assert_eq!(scheduler.get_stats().queue_size, 0);
        assert!(!scheduler.cancel(TaskId::new()));
    }

    #[tokio::test]
    async fn test_failure_requeues_then_fails() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let id = scheduler
            .submit(noop(), SubmitOptions::new().max_retries(1))
            .unwrap();

        let claim = scheduler.core.claim_next().unwrap().unwrap();
        let decision = scheduler
            .core
            .finish_failure(&claim, FailureKind::Error("boom".into()), 3)
            .unwrap();
        assert_eq!(decision, RetryDecision::Requeue);
        assert_eq!(scheduler.get_task_status(id), Some(TaskStatus::Pending));

        let claim = scheduler.core.claim_next().unwrap().unwrap();
        assert_eq!(claim.attempt, 2);
        scheduler
            .core
            .finish_failure(&claim, FailureKind::Error("boom".into()), 3)
            .unwrap();

        let record = scheduler.get_task(id).unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.result.unwrap().error.as_deref(), Some("boom"));

        let stats = scheduler.get_stats();
        assert_eq!(stats.retried, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_list_tasks_filters_and_orders() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let ids: Vec<TaskId> = (0..3)
            .map(|_| scheduler.submit(noop(), SubmitOptions::new()).unwrap())
            .collect();
        scheduler.cancel(ids[1]);

        let all: Vec<TaskId> = scheduler.list_tasks(None).iter().map(|r| r.id).collect();
        assert_eq!(all, ids);

        let pending = scheduler.list_tasks(Some(TaskStatus::Pending));
        assert_eq!(pending.len(), 2);
        assert_eq!(scheduler.list_tasks(Some(TaskStatus::Cancelled))[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_submit_rejected_after_stop() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let outcome = scheduler.stop(false, Duration::ZERO).await;
        assert!(outcome.drained);
        assert_eq!(outcome.abandoned_pending, 0);

        let err = scheduler.submit(noop(), SubmitOptions::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchedulerStopped);
    }

    #[test]
    fn test_zero_task_timeout_rejected() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let err = scheduler
            .submit(noop(), SubmitOptions::new().timeout_ms(0))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
        assert_eq!(scheduler.get_stats().submitted, 0);
        assert_eq!(scheduler.core.queue_len(), 0);
        assert!(scheduler.list_tasks(None).is_empty());

        assert!(scheduler
            .submit(noop(), SubmitOptions::new().timeout_ms(1))
            .is_ok());
    }

    #[tokio::test]
    async fn test_unbounded_waits_do_not_overflow() {
        let scheduler = TaskScheduler::with_defaults().unwrap();
        let outcome = scheduler.stop(true, Duration::MAX).await;
        assert!(outcome.drained);

        scheduler.start();
        let id = scheduler.submit(noop(), SubmitOptions::new()).unwrap();
        let record = scheduler.wait_for(id, Duration::MAX).await.unwrap();
        assert_eq!(record.status, TaskStatus::Completed);

        let outcome = scheduler.stop(true, Duration::MAX).await;
        assert!(outcome.drained);
        assert_eq!(outcome.abandoned_pending, 0);
        assert_eq!(outcome.abandoned_running, 0);
    }
}
