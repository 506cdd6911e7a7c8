//! Worker pool: a fixed set of loops claiming tasks from the scheduler core.
//!
//! Each loop holds one admission-gate permit while it claims and executes a
//! task. Work runs in its own spawned tokio task under a deadline, so a panic
//! or an expired deadline in user code never takes the loop down with it.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::{AbortHandle, JoinError, JoinHandle};

use super::retry::{FailureKind, RetryDecision};
use super::scheduler::SchedulerCore;
use super::task::{TaskId, TaskStatus, TaskWork};
use crate::error::{Result, VigilError};
use crate::telemetry::logging::SensitiveFieldRedactor;

/// Loops spawned by one `start` call.
struct PoolRuntime {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Fixed-size pool of worker loops.
pub(crate) struct WorkerPool {
    core: Arc<SchedulerCore>,
    gate: Arc<Semaphore>,
    runtime: Mutex<Option<PoolRuntime>>,
    live_workers: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub(crate) fn new(core: Arc<SchedulerCore>) -> Self {
        let gate = Arc::new(Semaphore::new(core.config.max_workers));
        Self {
            core,
            gate,
            runtime: Mutex::new(None),
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawn `max_workers` loops. A second call while running is a no-op.
    pub(crate) fn start(&self) -> bool {
        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            tracing::debug!(scheduler = %self.core.config.name, "Worker pool already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handles = (0..self.core.config.max_workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&self.core),
                    Arc::clone(&self.gate),
                    shutdown_rx.clone(),
                    LiveGuard::enter(&self.live_workers),
                ))
            })
            .collect();

        *runtime = Some(PoolRuntime { shutdown, handles });

        tracing::info!(
            scheduler = %self.core.config.name,
            max_workers = self.core.config.max_workers,
            "Worker pool started"
        );
        true
    }

    pub(crate) fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Number of loops currently alive.
    pub(crate) fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Signal shutdown, abort every loop and wait for them to unwind.
    ///
    /// Aborting a loop mid-task also aborts the task it was executing.
    pub(crate) async fn shutdown(&self) {
        let runtime = self.runtime.lock().take();
        let Some(runtime) = runtime else {
            return;
        };

        let _ = runtime.shutdown.send(true);
        for handle in &runtime.handles {
            handle.abort();
        }
        for handle in runtime.handles {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    tracing::error!(
                        scheduler = %self.core.config.name,
                        panic = %panic_message(err.into_panic().as_ref()),
                        "Worker loop panicked during shutdown"
                    );
                }
            }
        }

        tracing::info!(scheduler = %self.core.config.name, "Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            let _ = runtime.shutdown.send(true);
            for handle in runtime.handles {
                handle.abort();
            }
        }
    }
}

/// Keeps the live-worker count accurate however a loop ends.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Aborts the spawned work when the executing loop goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// How one loop iteration ended.
enum Iteration {
    Worked,
    Idle,
}

async fn run_worker(
    worker_id: usize,
    core: Arc<SchedulerCore>,
    gate: Arc<Semaphore>,
    mut shutdown: watch::Receiver<bool>,
    _live: LiveGuard,
) {
    tracing::debug!(worker_id, scheduler = %core.config.name, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let iteration = AssertUnwindSafe(worker_iteration(worker_id, &core, &gate))
            .catch_unwind()
            .await;

        let pause = match iteration {
            Ok(Ok(Iteration::Worked)) => continue,
            Ok(Ok(Iteration::Idle)) => core.config.poll_interval,
            Ok(Err(err)) => {
                core.stats.record_internal_error();
                err.log();
                tracing::error!(
                    worker_id,
                    error = %err,
                    backoff_ms = core.config.error_backoff.as_millis() as u64,
                    "Worker iteration failed"
                );
                core.config.error_backoff
            }
            Err(panic) => {
                core.stats.record_internal_error();
                let err = VigilError::worker_panicked(worker_id, panic_message(panic.as_ref()));
                err.log();
                tracing::error!(
                    worker_id,
                    error = %err,
                    backoff_ms = core.config.error_backoff.as_millis() as u64,
                    "Worker iteration panicked"
                );
                core.config.error_backoff
            }
        };

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }

    tracing::debug!(worker_id, scheduler = %core.config.name, "Worker stopped");
}

async fn worker_iteration(
    worker_id: usize,
    core: &Arc<SchedulerCore>,
    gate: &Arc<Semaphore>,
) -> Result<Iteration> {
    let _permit = Arc::clone(gate).acquire_owned().await?;

    let Some(claim) = core.claim_next()? else {
        return Ok(Iteration::Idle);
    };

    tracing::debug!(
        worker_id,
        task_id = %claim.id,
        task_name = %claim.name,
        priority = %claim.priority,
        attempt = claim.attempt,
        "Task claimed"
    );

    let (outcome, duration_ms) = execute(&claim.work, claim.timeout_ms).await;

    match outcome {
        Ok(value) => {
            core.finish_success(&claim, value, duration_ms)?;
            tracing::info!(
                worker_id,
                task_id = %claim.id,
                task_name = %claim.name,
                attempt = claim.attempt,
                duration_ms,
                "Task completed"
            );
        }
        Err(failure) => {
            let reason = match &failure {
                FailureKind::Timeout => "timeout".to_string(),
                FailureKind::Error(message) => SensitiveFieldRedactor::global().redact_value(message),
            };
            let decision = core.finish_failure(&claim, failure, duration_ms)?;
            match decision {
                RetryDecision::Requeue => tracing::warn!(
                    worker_id,
                    task_id = %claim.id,
                    task_name = %claim.name,
                    attempt = claim.attempt,
                    duration_ms,
                    reason = %reason,
                    "Task attempt failed, requeued"
                ),
                RetryDecision::Terminate { status, .. } => {
                    let err = settle_error(claim.id, claim.attempt, claim.timeout_ms, status, &reason);
                    tracing::warn!(
                        worker_id,
                        task_id = %claim.id,
                        task_name = %claim.name,
                        attempt = claim.attempt,
                        duration_ms,
                        status = %status,
                        error_code = %err.code(),
                        reason = %reason,
                        "Task settled after final attempt"
                    );
                }
            }
        }
    }

    Ok(Iteration::Worked)
}

/// Error for a task settled as `Failed` or `TimedOut`. Building it feeds the
/// `vigil_errors_total` counter.
fn settle_error(
    task_id: TaskId,
    attempt: u32,
    timeout_ms: u64,
    status: TaskStatus,
    reason: &str,
) -> VigilError {
    match status {
        TaskStatus::TimedOut => VigilError::task_timeout(task_id, attempt, timeout_ms),
        _ => VigilError::task_failed(task_id, attempt, reason),
    }
}

type AttemptOutcome = std::result::Result<serde_json::Value, FailureKind>;

/// Run one attempt under a deadline, returning the outcome and its duration.
async fn execute(work: &TaskWork, timeout_ms: u64) -> (AttemptOutcome, u64) {
    let started = Instant::now();
    let handle = tokio::spawn(work.invoke());
    let _abort = AbortOnDrop(handle.abort_handle());

    let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(FailureKind::Error(err.message)),
        Ok(Err(join_err)) => Err(FailureKind::Error(join_error_message(join_err))),
        Err(_elapsed) => Err(FailureKind::Timeout),
    };

    (outcome, started.elapsed().as_millis() as u64)
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("task panicked: {}", panic_message(err.into_panic().as_ref()))
    } else {
        "task was aborted".to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
