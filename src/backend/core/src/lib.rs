#![allow(clippy::result_large_err)]
//! # Vigil Core
//!
//! In-process background task scheduler for the Vigil monitoring platform.
//!
//! ## Architecture
//!
//! - **Tasks**: priority ordering store, worker pool, per-task state machine,
//!   retry/timeout policy and the `TaskScheduler` facade
//! - **Telemetry**: structured logging with redaction, Prometheus metrics
//! - **Config**: layered file + environment configuration
//! - **Error**: coded errors with severity-driven logging

pub mod config;
pub mod error;
pub mod tasks;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, VigilError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, VigilError};
    pub use crate::tasks::{
        SchedulerConfig, StatsSnapshot, StopOutcome, SubmitOptions, TaskId, TaskPriority,
        TaskRecord, TaskResult, TaskScheduler, TaskStatus, TaskWork, Work, WorkError, WorkResult,
    };
}
