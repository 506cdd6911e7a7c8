//! In-process priority task scheduler.
//!
//! - **Task**: identity, priority, lifecycle state machine and the work itself
//! - **Queue**: bounded priority ordering store with an explicit key function
//! - **Retry**: requeue-or-settle decision for failed and timed-out attempts
//! - **Worker**: fixed pool of loops executing tasks under a deadline
//! - **Scheduler**: the facade producers submit to and query
//! - **Stats**: counters and gauges, mirrored to the metrics facade
//! - **Builtin**: maintenance work the worker binary schedules for itself
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            TaskScheduler                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  submit() ──▶ ┌──────────────┐   claim    ┌──────────────────────┐   │
//! │               │ PriorityStore│──────────▶ │ WorkerPool           │   │
//! │               │ (prio, time, │            │ max_workers loops    │   │
//! │               │  sequence)   │ ◀───────── │ + admission gate     │   │
//! │               └──────────────┘  requeue   └──────────────────────┘   │
//! │                      │                               │               │
//! │                      ▼                               ▼               │
//! │               ┌──────────────────────────────────────────────────┐   │
//! │               │ Task table (TaskRecord per id) + SchedulerStats  │   │
//! │               └──────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use vigil_core::tasks::{SchedulerConfig, SubmitOptions, TaskPriority, TaskScheduler, TaskWork};
//!
//! let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig::default())?);
//! scheduler.start();
//!
//! let id = scheduler.submit(
//!     TaskWork::from_fn("notify", || async { Ok(serde_json::json!("sent")) }),
//!     SubmitOptions::new().priority(TaskPriority::High).timeout_ms(5_000),
//! )?;
//!
//! let record = scheduler.wait_for(id, Duration::from_secs(10)).await;
//! scheduler.stop(true, Duration::from_secs(30)).await;
//! ```

pub mod builtin;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod task;
mod worker;

pub use builtin::{HeartbeatWork, PathProbeWork, StatsReportWork};
pub use queue::PriorityStore;
pub use retry::{FailureKind, RetryDecision, RetryPolicy};
pub use scheduler::{SchedulerConfig, StopOutcome, SubmitOptions, TaskScheduler};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use task::{
    TaskId, TaskPriority, TaskRecord, TaskResult, TaskStatus, TaskWork, Work, WorkError,
    WorkResult,
};
