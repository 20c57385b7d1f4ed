//! Typed entry point for booking trips.

use std::sync::Arc;

use common::{RunId, UserId};
use engine::{Engine, WorkflowError};
use history::HistoryStore;

use crate::error::{Result, TripError};
use crate::names::WORKFLOW_BOOK_TRIP;
use crate::trip::Trip;

/// Starts `book-trip` runs and turns their outcome into a [`Trip`] or a
/// classified [`TripError`].
pub struct TripBookingClient<S: HistoryStore + Clone + 'static> {
    engine: Arc<Engine<S>>,
}

impl<S: HistoryStore + Clone + 'static> Clone for TripBookingClient<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: HistoryStore + Clone + 'static> TripBookingClient<S> {
    pub fn new(engine: Arc<Engine<S>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    /// Records a new run for a user. Blank user ids are rejected before any
    /// history is written.
    pub async fn start(&self, user_id: &str) -> Result<RunId> {
        let user_id =
            UserId::parse(user_id).ok_or_else(|| TripError::InvalidUserId(user_id.to_string()))?;
        self.engine
            .start_workflow(WORKFLOW_BOOK_TRIP, user_id.as_str())
            .await
            .map_err(TripError::Engine)
    }

    /// Drives a run to its outcome, resuming it from history if needed.
    #[tracing::instrument(skip(self))]
    pub async fn result(&self, run_id: RunId) -> Result<Trip> {
        let outcome = match self.engine.run_workflow(run_id).await {
            Ok(value) => {
                serde_json::from_value(value).map_err(|e| TripError::Engine(WorkflowError::from(e)))
            }
            Err(err) => Err(TripError::from(err)),
        };
        record_outcome(&outcome);
        outcome
    }

    /// Starts a run and waits for its outcome.
    pub async fn book_trip(&self, user_id: &str) -> Result<Trip> {
        let run_id = self.start(user_id).await?;
        self.result(run_id).await
    }
}

fn record_outcome(outcome: &Result<Trip>) {
    match outcome {
        Ok(_) => metrics::counter!("trip_bookings_completed").increment(1),
        Err(TripError::BookingsFailedAllCompensated { .. }) => {
            metrics::counter!("trip_bookings_compensated").increment(1)
        }
        Err(TripError::BookingsFailedCompensationFailed { .. }) => {
            metrics::counter!("trip_bookings_compensation_failed").increment(1);
            tracing::error!("trip bookings left uncompensated, remediation required");
        }
        Err(_) => {}
    }
}
