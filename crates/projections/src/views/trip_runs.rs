//! Trip runs read model: one summary per `book-trip` run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, RunId};
use engine::WorkflowEvent;
use history::HistoryRecord;
use serde::Serialize;
use tokio::sync::RwLock;
use trip_saga::names::WORKFLOW_BOOK_TRIP;
use trip_saga::{BRANCHES, SagaState, TripBranch, TripError};

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Summary of one trip booking run.
#[derive(Debug, Clone, Serialize)]
pub struct TripRunSummary {
    pub run_id: RunId,
    pub user_id: String,
    pub state: SagaState,
    /// Booking ids obtained so far, by branch.
    pub bookings: BTreeMap<TripBranch, BookingId>,
    pub failed_bookings: Vec<TripBranch>,
    pub failed_cancellations: Vec<TripBranch>,
    /// Terminal failure kind, once the run failed.
    pub error_kind: Option<String>,
    /// True when a reservation may have been left behind.
    pub needs_remediation: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    scheduled: HashMap<u64, String>,
}

fn is_cancellation(activity_type: &str) -> bool {
    BRANCHES.iter().any(|b| b.cancel.name() == activity_type)
}

/// Read model view of every trip booking run.
#[derive(Clone, Default)]
pub struct TripRunsView {
    runs: Arc<RwLock<HashMap<RunId, TripRunSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl TripRunsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_run(&self, run_id: RunId) -> Option<TripRunSummary> {
        self.runs.read().await.get(&run_id).cloned()
    }

    /// Gets all runs, oldest first.
    pub async fn all_runs(&self) -> Vec<TripRunSummary> {
        let mut runs: Vec<_> = self.runs.read().await.values().cloned().collect();
        runs.sort_by_key(|r| (r.started_at, r.run_id));
        runs
    }

    pub async fn runs_by_state(&self, state: SagaState) -> Vec<TripRunSummary> {
        self.all_runs()
            .await
            .into_iter()
            .filter(|r| r.state == state)
            .collect()
    }

    /// Failed runs whose compensation did not complete.
    pub async fn pending_remediation(&self) -> Vec<TripRunSummary> {
        self.all_runs()
            .await
            .into_iter()
            .filter(|r| r.needs_remediation)
            .collect()
    }

    async fn apply(&self, record: &HistoryRecord) -> Result<()> {
        if record.workflow_type != WORKFLOW_BOOK_TRIP {
            return Ok(());
        }

        let event: WorkflowEvent = serde_json::from_value(record.payload.clone())?;
        let run_id = record.run_id;
        let mut runs = self.runs.write().await;

        if let WorkflowEvent::WorkflowStarted(data) = &event {
            runs.insert(
                run_id,
                TripRunSummary {
                    run_id,
                    user_id: data.input.as_str().unwrap_or_default().to_string(),
                    state: SagaState::Booking,
                    bookings: BTreeMap::new(),
                    failed_bookings: Vec::new(),
                    failed_cancellations: Vec::new(),
                    error_kind: None,
                    needs_remediation: false,
                    started_at: data.started_at,
                    updated_at: record.timestamp,
                    scheduled: HashMap::new(),
                },
            );
            return Ok(());
        }

        let Some(run) = runs.get_mut(&run_id) else {
            tracing::warn!(%run_id, event_type = %record.event_type, "record for unknown run");
            return Ok(());
        };
        run.updated_at = record.timestamp;

        match event {
            WorkflowEvent::WorkflowStarted(_) => {}
            WorkflowEvent::ActivityScheduled(data) => {
                if is_cancellation(&data.activity_type) && run.state.can_compensate() {
                    run.state = SagaState::Compensating;
                }
                run.scheduled.insert(data.seq, data.activity_type);
            }
            WorkflowEvent::ActivityCompleted(data) => {
                let Some(activity_type) = run.scheduled.get(&data.seq) else {
                    return Ok(());
                };
                if let Some(branch) = TripBranch::for_activity(activity_type)
                    && !is_cancellation(activity_type)
                {
                    match data.result.as_str().filter(|id| !id.is_empty()) {
                        Some(id) => {
                            run.bookings.insert(branch, BookingId::new(id));
                        }
                        None => run.failed_bookings.push(branch),
                    }
                }
            }
            WorkflowEvent::ActivityFailed(data) => {
                let Some(activity_type) = run.scheduled.get(&data.seq) else {
                    return Ok(());
                };
                if let Some(branch) = TripBranch::for_activity(activity_type) {
                    if is_cancellation(activity_type) {
                        run.failed_cancellations.push(branch);
                    } else {
                        run.failed_bookings.push(branch);
                    }
                }
            }
            WorkflowEvent::WorkflowCompleted(_) => {
                run.state = SagaState::Completed;
            }
            WorkflowEvent::WorkflowFailed(data) => {
                run.state = SagaState::Failed;
                run.needs_remediation = data.failure.kind == TripError::COMPENSATION_FAILED;
                run.error_kind = Some(data.failure.kind);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Projection for TripRunsView {
    fn name(&self) -> &'static str {
        "TripRunsView"
    }

    /// The position only moves once the record has been applied, so a record
    /// that fails is delivered again on the next catch-up.
    async fn handle(&self, record: &HistoryRecord) -> Result<()> {
        self.apply(record).await?;
        let mut pos = self.position.write().await;
        *pos = pos.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.runs.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for TripRunsView {
    fn name(&self) -> &'static str {
        "TripRunsView"
    }

    fn count(&self) -> usize {
        self.runs.try_read().map(|r| r.len()).unwrap_or(0)
    }
}
