//! Execution outcomes.
//!
//! Handlers report their result through these types; the store's `release`
//! turns them into status transitions. Handler errors never surface as
//! faults past the dispatch boundary.

use serde::{Deserialize, Serialize};

/// How a handler failure should affect the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - the task goes back to pending while attempts remain.
    #[default]
    Retryable,
    /// Permanent error - the task fails immediately, budget notwithstanding.
    NonRetryable,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }
}

/// A handler failure with its retry classification.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Retryable,
            message: message.into(),
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NonRetryable,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(error: anyhow::Error) -> Self {
        Self::retryable(format!("{error:#}"))
    }
}

/// The result of executing one claimed task.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Handler finished; the value is recorded as the task's result.
    Success(serde_json::Value),
    /// Handler failed; the error detail is recorded and the retry
    /// policy applies.
    Failure(TaskError),
}

impl Outcome {
    pub fn success(value: serde_json::Value) -> Self {
        Outcome::Success(value)
    }

    pub fn failure(error: TaskError) -> Self {
        Outcome::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
