//! Task definitions: identity, priority, lifecycle state and the work itself.
//!
//! - **TaskId**: opaque identifier handed back by `submit`
//! - **TaskPriority**: claim rank, lower value claims first
//! - **TaskStatus**: the per-task state machine
//! - **Work / TaskWork**: the callable a task runs, with its captured arguments
//! - **TaskRecord**: the full lifecycle record kept in the scheduler's table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, VigilError};

// ═══════════════════════════════════════════════════════════════════════════════
// Task Identification
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Task Priority
// ═══════════════════════════════════════════════════════════════════════════════

/// Priority level for tasks. Lower numeric value is claimed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Alerts and anything user-visible that must go out now
    Critical = 0,
    /// Processed before normal work
    High = 1,
    /// Default for most tasks
    Normal = 2,
    /// Processed when nothing more urgent is waiting
    Low = 3,
    /// Maintenance and housekeeping
    Background = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskPriority {
    /// Numeric rank used by the ordering key.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Background => "background",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Task Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the ordering store for a worker
    Pending,
    /// Claimed by a worker and executing
    Running,
    /// Work returned normally before its deadline
    Completed,
    /// Work errored and the retry budget is exhausted
    Failed,
    /// Removed before any worker claimed it
    Cancelled,
    /// Work missed its deadline and the retry budget is exhausted
    TimedOut,
}

impl TaskStatus {
    /// Whether `self -> target` is an edge of the state machine.
    ///
    /// `Running -> Pending` is the requeue edge.
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, target),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Work Error
// ═══════════════════════════════════════════════════════════════════════════════

/// Error returned by a work function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkError {
    /// Error message, preserved verbatim in the task result
    pub message: String,
    /// Optional machine-readable code
    pub code: Option<String>,
}

impl WorkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkError {}

impl From<anyhow::Error> for WorkError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{:#}", error))
    }
}

impl From<VigilError> for WorkError {
    fn from(error: VigilError) -> Self {
        Self {
            message: error.user_message().to_string(),
            code: Some(error.code().to_string()),
        }
    }
}

impl From<String> for WorkError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for WorkError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type for one execution of a work function.
pub type WorkResult = std::result::Result<serde_json::Value, WorkError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Work
// ═══════════════════════════════════════════════════════════════════════════════

/// A unit of work the scheduler can run.
///
/// Implementations capture their own arguments. `run` may be invoked more than
/// once when the task is retried, so it takes `&self`.
#[async_trait]
pub trait Work: Send + Sync {
    /// Name used as the task label when the submitter gives none.
    fn name(&self) -> &str;

    /// Execute one attempt.
    async fn run(&self) -> WorkResult;
}

/// Adapter turning a named closure into [`Work`].
struct FnWork<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F, Fut> Work for FnWork<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> WorkResult {
        (self.func)().await
    }
}

/// Shared handle to a task's work. Cloning is cheap.
#[derive(Clone)]
pub struct TaskWork(Arc<dyn Work>);

impl TaskWork {
    /// Wrap any [`Work`] implementation.
    pub fn new(work: impl Work + 'static) -> Self {
        Self(Arc::new(work))
    }

    /// Build work from a closure. Arguments are captured by the closure and
    /// cloned into each attempt's future.
    ///
    /// ```rust,ignore
    /// let recipient = "ops@example.com".to_string();
    /// let work = TaskWork::from_fn("send_email", move || {
    ///     let recipient = recipient.clone();
    ///     async move { mailer::send(&recipient).await.map_err(WorkError::from) }
    /// });
    /// ```
    pub fn from_fn<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self(Arc::new(FnWork {
            name: name.into(),
            func,
        }))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Run one attempt as an owned future, suitable for `tokio::spawn`.
    pub fn invoke(&self) -> impl Future<Output = WorkResult> + Send + 'static {
        let work = Arc::clone(&self.0);
        async move { work.run().await }
    }
}

impl fmt::Debug for TaskWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskWork").field(&self.name()).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Task Result
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of the attempt that settled a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the work returned normally
    pub success: bool,
    /// Value returned by the work (success only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Error text (failure, timeout, or cancellation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration of the settling attempt in milliseconds
    pub duration_ms: u64,
    /// 1-based attempt number that produced this result
    pub attempt: u32,
}

impl TaskResult {
    pub fn success(value: serde_json::Value, duration_ms: u64, attempt: u32) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            duration_ms,
            attempt,
        }
    }

    pub fn failure(error: impl Into<String>, duration_ms: u64, attempt: u32) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.into()),
            duration_ms,
            attempt,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Task Record
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity and lifecycle of one submitted task.
///
/// All state changes go through the `mark_*` / `requeue` methods, which check
/// the transition against [`TaskStatus::can_transition_to`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    #[serde(skip)]
    pub work: TaskWork,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub max_retries: u32,
    pub retry_count: u32,
    /// Times the task has entered `Running`
    pub attempts: u32,
    pub timeout_ms: u64,
    /// Submission sequence, the FIFO tie-break within a priority
    pub sequence: u64,
}

impl TaskRecord {
    pub fn new(
        work: TaskWork,
        name: Option<String>,
        priority: TaskPriority,
        timeout_ms: u64,
        max_retries: u32,
        sequence: u64,
    ) -> Self {
        let name = name.unwrap_or_else(|| work.name().to_string());
        Self {
            id: TaskId::new(),
            name,
            work,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            max_retries,
            retry_count: 0,
            attempts: 0,
            timeout_ms,
            sequence,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(&to) {
            return Err(VigilError::invalid_state_transition(self.id, self.status, to));
        }
        self.status = to;
        Ok(())
    }

    /// `Pending -> Running`: a worker has claimed the task.
    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        self.attempts += 1;
        Ok(())
    }

    /// `Running -> Completed`.
    pub fn mark_completed(&mut self, value: serde_json::Value, duration_ms: u64) -> Result<()> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(TaskResult::success(value, duration_ms, self.attempts));
        Ok(())
    }

    /// `Running -> Failed`, keeping the error text verbatim.
    pub fn mark_failed(&mut self, error: impl Into<String>, duration_ms: u64) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(TaskResult::failure(error, duration_ms, self.attempts));
        Ok(())
    }

    /// `Running -> TimedOut`.
    pub fn mark_timed_out(&mut self, error: impl Into<String>, duration_ms: u64) -> Result<()> {
        self.transition(TaskStatus::TimedOut)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(TaskResult::failure(error, duration_ms, self.attempts));
        Ok(())
    }

    /// `Pending -> Cancelled`.
    pub fn mark_cancelled(&mut self) -> Result<()> {
        self.transition(TaskStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Pending` for another attempt.
    ///
    /// Increments `retry_count` by one and clears the attempt timestamps.
    /// Fails without touching the record if the budget is already spent.
    pub fn requeue(&mut self) -> Result<()> {
        if self.retry_count >= self.max_retries {
            return Err(VigilError::internal(format!(
                "task {} requeued with exhausted retry budget ({}/{})",
                self.id, self.retry_count, self.max_retries
            )));
        }
        self.transition(TaskStatus::Pending)?;
        self.retry_count += 1;
        self.started_at = None;
        self.completed_at = None;
        Ok(())
    }

    /// Execution time of the settled attempt.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn noop_work() -> TaskWork {
        TaskWork::from_fn("noop", || async { Ok(serde_json::Value::Null) })
    }

    fn record(max_retries: u32) -> TaskRecord {
        TaskRecord::new(noop_work(), None, TaskPriority::Normal, 1_000, max_retries, 0)
    }

    #[test]
    fn test_task_id_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn test_priority_rank_ordering() {
        assert!(TaskPriority::Critical < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::Low);
        assert!(TaskPriority::Low < TaskPriority::Background);
        assert_eq!(TaskPriority::Critical.rank(), 0);
        assert_eq!(TaskPriority::Background.rank(), 4);
    }

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::TimedOut.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(&Running));
        assert!(Pending.can_transition_to(&Cancelled));
        assert!(Running.can_transition_to(&Pending));
        assert!(!Running.can_transition_to(&Cancelled));
        assert!(!Pending.can_transition_to(&Completed));
        assert!(!Completed.can_transition_to(&Running));
        assert!(!Cancelled.can_transition_to(&Pending));
        assert!(!TimedOut.can_transition_to(&Pending));
    }

    #[test]
    fn test_name_defaults_to_work_name() {
        let rec = record(0);
        assert_eq!(rec.name, "noop");

        let named = TaskRecord::new(
            noop_work(),
            Some("nightly-cleanup".to_string()),
            TaskPriority::Background,
            1_000,
            0,
            1,
        );
        assert_eq!(named.name, "nightly-cleanup");
    }

    #[test]
    fn test_success_lifecycle() {
        let mut rec = record(3);
        rec.mark_running().unwrap();
        assert_eq!(rec.status, TaskStatus::Running);
        assert!(rec.started_at.is_some());
        assert_eq!(rec.attempts, 1);

        rec.mark_completed(serde_json::json!("ok"), 12).unwrap();
        assert_eq!(rec.status, TaskStatus::Completed);
        let result = rec.result.as_ref().unwrap();
        assert!(result.success);
        assert_eq!(result.value, Some(serde_json::json!("ok")));
        assert_eq!(result.duration_ms, 12);
        assert_eq!(result.attempt, 1);
        assert!(rec.duration().is_some());
    }

    #[test]
    fn test_requeue_resets_attempt_state() {
        let mut rec = record(2);
        let id = rec.id;
        let created = rec.created_at;

        rec.mark_running().unwrap();
        rec.requeue().unwrap();

        assert_eq!(rec.status, TaskStatus::Pending);
        assert_eq!(rec.retry_count, 1);
        assert!(rec.started_at.is_none());
        assert!(rec.completed_at.is_none());
        assert_eq!(rec.id, id);
        assert_eq!(rec.created_at, created);
    }

    #[test]
    fn test_requeue_refuses_exhausted_budget() {
        let mut rec = record(0);
        rec.mark_running().unwrap();
        assert!(rec.requeue().is_err());
        assert_eq!(rec.status, TaskStatus::Running);
        assert_eq!(rec.retry_count, 0);
    }

    #[test]
    fn test_invalid_transition_reported() {
        let mut rec = record(1);
        let err = rec.mark_completed(serde_json::Value::Null, 0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(rec.status, TaskStatus::Pending);

        rec.mark_running().unwrap();
        let err = rec.mark_cancelled().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(rec.status, TaskStatus::Running);
    }

    #[test]
    fn test_failure_keeps_error_verbatim() {
        let mut rec = record(0);
        rec.mark_running().unwrap();
        rec.mark_failed("smtp 550: mailbox unavailable", 7).unwrap();
        let result = rec.result.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("smtp 550: mailbox unavailable"));
    }

    #[test]
    fn test_record_serialization_skips_work() {
        let rec = record(1);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("work").is_none());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "normal");
    }

    #[tokio::test]
    async fn test_work_from_fn_captures_arguments() {
        let target = "https://hooks.example.com/alert".to_string();
        let work = TaskWork::from_fn("webhook", move || {
            let target = target.clone();
            async move { Ok(serde_json::json!({ "target": target })) }
        });

        assert_eq!(work.name(), "webhook");
        let first = work.invoke().await.unwrap();
        let second = work.invoke().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first["target"], "https://hooks.example.com/alert");
    }

    #[test]
    fn test_work_error_conversions() {
        let err: WorkError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.message, "connection reset");

        let err = WorkError::new("bad payload").with_code("E_PAYLOAD");
        assert_eq!(err.to_string(), "bad payload (code: E_PAYLOAD)");
    }
}
