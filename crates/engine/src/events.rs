//! Events recorded in a run's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ActivityFailure, WorkflowFailure};

pub const WORKFLOW_STARTED: &str = "WorkflowStarted";
pub const ACTIVITY_SCHEDULED: &str = "ActivityScheduled";
pub const ACTIVITY_COMPLETED: &str = "ActivityCompleted";
pub const ACTIVITY_FAILED: &str = "ActivityFailed";
pub const WORKFLOW_COMPLETED: &str = "WorkflowCompleted";
pub const WORKFLOW_FAILED: &str = "WorkflowFailed";

/// Every fact the engine records about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    WorkflowStarted(WorkflowStartedData),
    ActivityScheduled(ActivityScheduledData),
    ActivityCompleted(ActivityCompletedData),
    ActivityFailed(ActivityFailedData),
    WorkflowCompleted(WorkflowCompletedData),
    WorkflowFailed(WorkflowFailedData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStartedData {
    pub workflow_type: String,
    pub task_queue: String,
    pub input: Value,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityScheduledData {
    pub seq: u64,
    pub activity_type: String,
    pub task_queue: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCompletedData {
    pub seq: u64,
    pub result: Value,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFailedData {
    pub seq: u64,
    pub failure: ActivityFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCompletedData {
    pub result: Value,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFailedData {
    pub failure: WorkflowFailure,
    pub failed_at: DateTime<Utc>,
}

impl WorkflowEvent {
    /// Returns the event type name stored alongside the record.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStarted(_) => WORKFLOW_STARTED,
            WorkflowEvent::ActivityScheduled(_) => ACTIVITY_SCHEDULED,
            WorkflowEvent::ActivityCompleted(_) => ACTIVITY_COMPLETED,
            WorkflowEvent::ActivityFailed(_) => ACTIVITY_FAILED,
            WorkflowEvent::WorkflowCompleted(_) => WORKFLOW_COMPLETED,
            WorkflowEvent::WorkflowFailed(_) => WORKFLOW_FAILED,
        }
    }

    pub fn workflow_started(
        workflow_type: impl Into<String>,
        task_queue: impl Into<String>,
        input: Value,
    ) -> Self {
        WorkflowEvent::WorkflowStarted(WorkflowStartedData {
            workflow_type: workflow_type.into(),
            task_queue: task_queue.into(),
            input,
            started_at: Utc::now(),
        })
    }

    pub fn activity_scheduled(
        seq: u64,
        activity_type: impl Into<String>,
        task_queue: impl Into<String>,
        args: Value,
    ) -> Self {
        WorkflowEvent::ActivityScheduled(ActivityScheduledData {
            seq,
            activity_type: activity_type.into(),
            task_queue: task_queue.into(),
            args,
        })
    }

    pub fn activity_completed(seq: u64, result: Value, attempts: u32) -> Self {
        WorkflowEvent::ActivityCompleted(ActivityCompletedData {
            seq,
            result,
            attempts,
        })
    }

    pub fn activity_failed(seq: u64, failure: ActivityFailure) -> Self {
        WorkflowEvent::ActivityFailed(ActivityFailedData { seq, failure })
    }

    pub fn workflow_completed(result: Value) -> Self {
        WorkflowEvent::WorkflowCompleted(WorkflowCompletedData {
            result,
            completed_at: Utc::now(),
        })
    }

    pub fn workflow_failed(failure: WorkflowFailure) -> Self {
        WorkflowEvent::WorkflowFailed(WorkflowFailedData {
            failure,
            failed_at: Utc::now(),
        })
    }
}
