//! A run's state, folded from its history.

use std::collections::BTreeMap;

use common::RunId;
use history::{HistoryRecord, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ActivityFailure, WorkflowFailure};
use crate::events::WorkflowEvent;

/// Lifecycle of a run.
///
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RunStatus {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Returns true once the run has a recorded outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotStarted => "NotStarted",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recorded outcome of an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivityOutcome {
    Completed { result: Value, attempts: u32 },
    Failed(ActivityFailure),
}

/// An activity the run scheduled, with its outcome once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_type: String,
    pub task_queue: String,
    pub args: Value,
    pub outcome: Option<ActivityOutcome>,
}

/// Snapshot of a run rebuilt by applying its history in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowRun {
    run_id: Option<RunId>,
    version: Version,
    workflow_type: String,
    task_queue: String,
    input: Value,
    status: RunStatus,
    activities: BTreeMap<u64, ActivityRecord>,
    result: Option<Value>,
    failure: Option<WorkflowFailure>,
}

impl WorkflowRun {
    /// Rebuilds a run from its records.
    pub fn from_history(records: &[HistoryRecord]) -> Result<Self, serde_json::Error> {
        let mut run = Self::default();
        for record in records {
            let event: WorkflowEvent = serde_json::from_value(record.payload.clone())?;
            run.run_id = Some(record.run_id);
            run.version = record.version;
            run.apply(event);
        }
        Ok(run)
    }

    /// Applies one event.
    pub fn apply(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::WorkflowStarted(data) => {
                self.workflow_type = data.workflow_type;
                self.task_queue = data.task_queue;
                self.input = data.input;
                self.status = RunStatus::Running;
            }
            WorkflowEvent::ActivityScheduled(data) => {
                self.activities.insert(
                    data.seq,
                    ActivityRecord {
                        activity_type: data.activity_type,
                        task_queue: data.task_queue,
                        args: data.args,
                        outcome: None,
                    },
                );
            }
            WorkflowEvent::ActivityCompleted(data) => {
                if let Some(activity) = self.activities.get_mut(&data.seq) {
                    activity.outcome = Some(ActivityOutcome::Completed {
                        result: data.result,
                        attempts: data.attempts,
                    });
                }
            }
            WorkflowEvent::ActivityFailed(data) => {
                if let Some(activity) = self.activities.get_mut(&data.seq) {
                    activity.outcome = Some(ActivityOutcome::Failed(data.failure));
                }
            }
            WorkflowEvent::WorkflowCompleted(data) => {
                self.result = Some(data.result);
                self.status = RunStatus::Completed;
            }
            WorkflowEvent::WorkflowFailed(data) => {
                self.failure = Some(data.failure);
                self.status = RunStatus::Failed;
            }
        }
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    /// Version of the last applied record.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn activity(&self, seq: u64) -> Option<&ActivityRecord> {
        self.activities.get(&seq)
    }

    /// Scheduled activities in dispatch order.
    pub fn activities(&self) -> impl Iterator<Item = (u64, &ActivityRecord)> {
        self.activities.iter().map(|(seq, record)| (*seq, record))
    }

    /// Number of scheduled activities still waiting for an outcome.
    pub fn in_flight(&self) -> usize {
        self.activities
            .values()
            .filter(|a| a.outcome.is_none())
            .count()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn failure(&self) -> Option<&WorkflowFailure> {
        self.failure.as_ref()
    }
}
