//! Engine error types.

use std::time::Duration;

use common::RunId;
use history::HistoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a single activity attempt.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The activity reported a failure; the attempt may be retried.
    #[error("{0}")]
    Application(String),

    /// The activity reported a failure that must not be retried.
    #[error("{0}")]
    NonRetryable(String),

    /// The attempt did not finish within its start-to-close timeout.
    #[error("Activity attempt timed out after {0:?}")]
    Timeout(Duration),

    /// No handler for the activity type on the task queue.
    #[error("Activity '{activity_type}' is not registered on task queue '{task_queue}'")]
    NotRegistered {
        activity_type: String,
        task_queue: String,
    },

    /// No worker serves the task queue.
    #[error("No worker serves task queue '{0}'")]
    UnknownTaskQueue(String),

    /// Arguments or result did not match the operation's schema.
    #[error("Invalid activity payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ActivityError {
    /// Creates a retryable application failure.
    pub fn application(message: impl Into<String>) -> Self {
        ActivityError::Application(message.into())
    }

    /// Creates a failure that ends the activity without further attempts.
    pub fn non_retryable(message: impl Into<String>) -> Self {
        ActivityError::NonRetryable(message.into())
    }

    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Application(_) | ActivityError::Timeout(_))
    }
}

/// Final failure of an activity after its retry policy was exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Activity '{activity_type}' failed after {attempts} attempt(s): {reason}")]
pub struct ActivityFailure {
    /// The activity type that failed.
    pub activity_type: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// The error of the last attempt.
    pub reason: String,
}

/// Business-level failure recorded as a run's outcome.
///
/// `kind` names the failure so callers can match on it after a round trip
/// through history; `details` carries its structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct WorkflowFailure {
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl WorkflowFailure {
    /// Kind used for activity failures the workflow did not handle.
    pub const ACTIVITY_FAILURE: &'static str = "ActivityFailure";

    /// Creates a failure without details.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attaches structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

impl From<ActivityFailure> for WorkflowFailure {
    fn from(failure: ActivityFailure) -> Self {
        let message = failure.to_string();
        let details = serde_json::to_value(&failure).unwrap_or_default();
        WorkflowFailure::new(Self::ACTIVITY_FAILURE, message).with_details(details)
    }
}

/// Errors that can occur while running a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An activity failed after all attempts.
    #[error(transparent)]
    Activity(#[from] ActivityFailure),

    /// The workflow failed with a business failure.
    #[error("Workflow failed: {0}")]
    Failed(WorkflowFailure),

    /// Workflow code diverged from the recorded history.
    #[error("Nondeterministic workflow: {0}")]
    NonDeterminism(String),

    /// No workflow registered under this type.
    #[error("Workflow type not registered: {0}")]
    NotRegistered(String),

    /// The run has no history.
    #[error("Workflow run not found: {0}")]
    RunNotFound(RunId),

    /// The history store failed.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Returns true if the error is a recorded business outcome rather than
    /// an infrastructure fault that leaves the run resumable.
    pub fn is_run_outcome(&self) -> bool {
        matches!(self, WorkflowError::Activity(_) | WorkflowError::Failed(_))
    }
}
