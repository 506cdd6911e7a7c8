//! Error handling for the Vigil task scheduler.
//!
//! This module provides:
//! - A single error type with machine-readable codes and chaining
//! - User-facing messages vs detailed internal messages
//! - Severity levels that drive logging
//! - Metrics integration for error tracking
//!
//! Failures of individual work functions are *not* represented here; they are
//! captured in the task record (see [`crate::tasks::WorkError`]). `VigilError`
//! covers the scheduler's own surface: backpressure, lifecycle misuse,
//! state machine violations and configuration problems.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vigil_core::error::{VigilError, Result, ErrorCode};
//!
//! fn admit(len: usize, max: usize) -> Result<()> {
//!     if len >= max {
//!         return Err(VigilError::queue_full(max));
//!     }
//!     Ok(())
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::tasks::{TaskId, TaskStatus};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, VigilError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Queue Errors (1000-1099)
    QueueFull,
    SchedulerStopped,

    // Task Errors (1100-1199)
    TaskNotFound,
    InvalidStateTransition,
    TaskExecutionFailed,
    TaskTimeout,
    WorkerPanicked,

    // Serialization Errors (2200-2299)
    SerializationError,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::QueueFull => 1000,
            Self::SchedulerStopped => 1001,

            Self::TaskNotFound => 1100,
            Self::InvalidStateTransition => 1101,
            Self::TaskExecutionFailed => 1102,
            Self::TaskTimeout => 1103,
            Self::WorkerPanicked => 1104,

            Self::SerializationError => 2200,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            Self::InternalError => 9000,
        }
    }

    /// Whether the caller may retry the same operation later.
    ///
    /// Only backpressure is transient from the caller's point of view.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull)
    }

    /// Get the error category for grouping in metrics.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::QueueFull | Self::SchedulerStopped => "queue",
            Self::TaskNotFound
            | Self::InvalidStateTransition
            | Self::TaskExecutionFailed
            | Self::TaskTimeout
            | Self::WorkerPanicked => "task",
            Self::SerializationError => "serialization",
            Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration => "configuration",
            Self::InternalError => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors and expected conditions
    Low,
    /// Operational issues (backpressure, timeouts)
    Medium,
    /// Scheduler defects and misconfiguration
    High,
    /// Critical errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::TaskNotFound | ErrorCode::SchedulerStopped => Self::Low,

            ErrorCode::QueueFull
            | ErrorCode::TaskExecutionFailed
            | ErrorCode::TaskTimeout => Self::Medium,

            ErrorCode::InvalidStateTransition
            | ErrorCode::WorkerPanicked
            | ErrorCode::SerializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (task, worker, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Vigil.
#[derive(Error, Debug)]
pub struct VigilError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for VigilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl VigilError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal scheduler error occurred",
            message,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// True if this is the backpressure signal from `submit`.
    pub fn is_queue_full(&self) -> bool {
        self.code == ErrorCode::QueueFull
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    "Scheduler error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Scheduler warning"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Scheduler notice"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "vigil_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<serde_json::Error> for VigilError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::SerializationError,
            "Failed to serialize or deserialize data",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<tokio::sync::AcquireError> for VigilError {
    fn from(error: tokio::sync::AcquireError) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "Admission gate closed",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<std::io::Error> for VigilError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::NotFound => (ErrorCode::MissingConfiguration, "File not found"),
            _ => (ErrorCode::InternalError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for VigilError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<VigilError>() {
            Ok(vigil_error) => vigil_error,
            Err(error) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal scheduler error occurred",
                error.to_string(),
            ),
        }
    }
}

impl From<config::ConfigError> for VigilError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (
                ErrorCode::ConfigurationError,
                "Configuration error occurred",
            ),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl VigilError {
    /// The ordering store is at capacity.
    pub fn queue_full(max_size: usize) -> Self {
        Self::new(
            ErrorCode::QueueFull,
            format!("Task queue is full (max {} pending tasks)", max_size),
        )
        .with_details(
            ErrorDetails::new()
                .with_context("max_queue_size", max_size)
                .with_suggestion("Retry the submission later or drop the work"),
        )
    }

    /// The scheduler is stopping or stopped and does not accept new work.
    pub fn scheduler_stopped(name: &str) -> Self {
        Self::new(
            ErrorCode::SchedulerStopped,
            format!("Scheduler '{}' is not accepting new tasks", name),
        )
    }

    /// A task id is unknown to the task table.
    pub fn task_not_found(task_id: TaskId) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
        .with_details(ErrorDetails::new().with_entity("task", task_id.to_string()))
    }

    /// A task state transition the state machine does not allow.
    pub fn invalid_state_transition(task_id: TaskId, from: TaskStatus, to: TaskStatus) -> Self {
        Self::new(
            ErrorCode::InvalidStateTransition,
            format!("Invalid task state transition: {} -> {}", from, to),
        )
        .with_details(ErrorDetails::new().with_entity("task", task_id.to_string()))
        .with_context("from_state", from.to_string())
        .with_context("to_state", to.to_string())
    }

    /// A task exhausted its retry budget on errors.
    pub fn task_failed(task_id: TaskId, attempts: u32, message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::TaskExecutionFailed,
            format!("Task failed after {} attempt(s)", attempts),
            message,
        )
        .with_details(ErrorDetails::new().with_entity("task", task_id.to_string()))
    }

    /// A task exhausted its retry budget on deadline misses.
    pub fn task_timeout(task_id: TaskId, attempts: u32, timeout_ms: u64) -> Self {
        Self::new(
            ErrorCode::TaskTimeout,
            format!(
                "Task timed out after {} attempt(s) of {}ms",
                attempts, timeout_ms
            ),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("task", task_id.to_string())
                .with_context("timeout_ms", timeout_ms)
                .with_suggestion("Raise the task's timeout_ms or split the work"),
        )
    }

    /// A worker loop's own bookkeeping panicked.
    pub fn worker_panicked(worker_id: usize, message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::WorkerPanicked, "Worker loop panicked", message)
            .with_details(ErrorDetails::new().with_entity("worker", worker_id.to_string()))
    }

    /// Invalid configuration value.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_internal(
            ErrorCode::InvalidConfiguration,
            "Invalid scheduler configuration",
            message,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_is_retryable() {
        let error = VigilError::queue_full(10);
        assert_eq!(error.code(), ErrorCode::QueueFull);
        assert!(error.is_retryable());
        assert!(error.is_queue_full());
        assert_eq!(error.severity(), ErrorSeverity::Medium);
        assert!(error.details().context.contains_key("max_queue_size"));
    }

    #[test]
    fn test_invalid_transition_details() {
        let id = TaskId::new();
        let error =
            VigilError::invalid_state_transition(id, TaskStatus::Completed, TaskStatus::Running);
        assert_eq!(error.code(), ErrorCode::InvalidStateTransition);
        assert!(!error.is_retryable());
        assert_eq!(error.details().entity_id, Some(id.to_string()));
        assert!(error.user_message().contains("completed -> running"));
    }

    #[test]
    fn test_task_settlement_errors() {
        let id = TaskId::new();

        let failed = VigilError::task_failed(id, 3, "upstream returned 503");
        assert_eq!(failed.code(), ErrorCode::TaskExecutionFailed);
        assert_eq!(failed.severity(), ErrorSeverity::Medium);
        assert_eq!(failed.details().entity_type.as_deref(), Some("task"));
        assert!(failed.to_string().contains("upstream returned 503"));

        let timed_out = VigilError::task_timeout(id, 1, 30_000);
        assert_eq!(timed_out.code(), ErrorCode::TaskTimeout);
        assert!(!timed_out.is_retryable());
        assert!(timed_out.details().suggested_action.is_some());

        let panicked = VigilError::worker_panicked(2, "poisoned state");
        assert_eq!(panicked.code(), ErrorCode::WorkerPanicked);
        assert_eq!(panicked.severity(), ErrorSeverity::High);
        assert_eq!(panicked.details().entity_id.as_deref(), Some("2"));
        assert_eq!(panicked.code().category(), "task");
    }

    #[test]
    fn test_serialization_error_conversion() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = VigilError::from(source);
        assert_eq!(error.code(), ErrorCode::SerializationError);
        assert_eq!(error.code().category(), "serialization");
    }

    #[test]
    fn test_error_display() {
        let error = VigilError::with_internal(
            ErrorCode::InternalError,
            "Claim failed",
            "record vanished from table",
        );

        let display = format!("{}", error);
        assert!(display.contains("InternalError"));
        assert!(display.contains("Claim failed"));
        assert!(display.contains("record vanished"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::TaskNotFound),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::TaskTimeout),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InvalidConfiguration),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InternalError),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let original = VigilError::scheduler_stopped("test");
        let wrapped: anyhow::Error = original.into();
        let back = VigilError::from(wrapped);
        assert_eq!(back.code(), ErrorCode::SchedulerStopped);
    }

    #[test]
    fn test_numeric_codes_are_unique() {
        let codes = [
            ErrorCode::QueueFull,
            ErrorCode::SchedulerStopped,
            ErrorCode::TaskNotFound,
            ErrorCode::InvalidStateTransition,
            ErrorCode::TaskExecutionFailed,
            ErrorCode::TaskTimeout,
            ErrorCode::WorkerPanicked,
            ErrorCode::SerializationError,
            ErrorCode::ConfigurationError,
            ErrorCode::MissingConfiguration,
            ErrorCode::InvalidConfiguration,
            ErrorCode::InternalError,
        ];
        let mut seen = std::collections::HashSet::new();
        for code in codes {
            assert!(seen.insert(code.numeric_code()));
        }
    }
}
