//! Retry policy: decides whether a failed attempt is requeued or settled.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::TaskStatus;

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The work did not finish within its deadline
    Timeout,
    /// The work returned an error (or panicked); carries the message
    Error(String),
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back in the ordering store for another attempt
    Requeue,
    /// Settle the task in a terminal status
    Terminate {
        status: TaskStatus,
        /// Error text to store in the task result
        error: String,
    },
}

/// Retry policy shared by all tasks of a scheduler.
///
/// The budget itself (`max_retries`) is per task; the policy only adds an
/// optional fixed pause before a requeued task becomes claimable again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Pause before requeueing a failed attempt
    #[serde(with = "humantime_serde", default)]
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    /// Decide the fate of a failed attempt.
    ///
    /// Timeouts and errors share one counting rule: retry while
    /// `retry_count < max_retries`. Exhaustion settles timeouts as `TimedOut`
    /// and errors as `Failed` with the message kept verbatim.
    pub fn decide(
        &self,
        retry_count: u32,
        max_retries: u32,
        failure: &FailureKind,
        timeout_ms: u64,
    ) -> RetryDecision {
        if retry_count < max_retries {
            return RetryDecision::Requeue;
        }

        match failure {
            FailureKind::Timeout => RetryDecision::Terminate {
                status: TaskStatus::TimedOut,
                error: timeout_message(timeout_ms),
            },
            FailureKind::Error(message) => RetryDecision::Terminate {
                status: TaskStatus::Failed,
                error: message.clone(),
            },
        }
    }
}

/// Error text stored for a deadline expiry.
pub fn timeout_message(timeout_ms: u64) -> String {
    format!("task timed out after {}ms", timeout_ms)
}
