//! The `book-trip` workflow.

use async_trait::async_trait;
use common::UserId;
use engine::{Workflow, WorkflowContext, WorkflowError};

use crate::compensation::compensate_all;
use crate::error::TripError;
use crate::fan_out::{BookingVerdict, book_all};
use crate::names::WORKFLOW_BOOK_TRIP;
use crate::state::SagaState;
use crate::trip::Trip;

/// Books a car, a hotel and a flight in parallel; if any booking fails,
/// cancels all three.
///
/// Passes through booking once and compensation at most once. Retries of
/// individual calls come from the run's activity options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookTripWorkflow;

#[async_trait]
impl Workflow for BookTripWorkflow {
    type Input = String;
    type Output = Trip;

    fn name(&self) -> &'static str {
        WORKFLOW_BOOK_TRIP
    }

    async fn execute(&self, ctx: &WorkflowContext, input: String) -> Result<Trip, WorkflowError> {
        let user_id = UserId::parse(input.clone()).ok_or(TripError::InvalidUserId(input))?;
        let run_id = ctx.run_id();

        if !ctx.is_replaying() {
            tracing::info!(%run_id, %user_id, state = %SagaState::Booking, "BookTrip workflow started");
        }

        let partial = match book_all(ctx, &user_id).await? {
            BookingVerdict::Booked(trip) => {
                if !ctx.is_replaying() {
                    tracing::info!(%run_id, state = %SagaState::Completed, %trip, "BookTrip workflow completed");
                }
                return Ok(trip);
            }
            BookingVerdict::Failed(partial) => partial,
        };

        // A recorded cancellation means this decision was already taken.
        if !ctx.is_replaying() {
            tracing::warn!(
                %run_id,
                state = %SagaState::Compensating,
                failed = partial.failures.len(),
                "bookings failed, cancelling all bookings"
            );
        }
        let outcome = compensate_all(ctx, &user_id, &partial).await?;
        let err = outcome.into_error(partial.failures);

        if !ctx.is_replaying() {
            tracing::warn!(%run_id, state = %SagaState::Failed, kind = err.kind(), "BookTrip workflow failed");
        }
        Err(err.into())
    }
}
