//! Unconditional compensation of every branch.

use common::UserId;
use engine::{WorkflowContext, WorkflowError};
use futures_util::future::join_all;

use crate::branch::BRANCHES;
use crate::error::{BookingFailure, CancellationFailure, TripError};
use crate::fan_out::PartialBookings;

/// Outcome of the cancellation fan-in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompensationOutcome {
    pub failed_cancellations: Vec<CancellationFailure>,
}

impl CompensationOutcome {
    /// Returns true if every cancellation succeeded.
    pub fn all_compensated(&self) -> bool {
        self.failed_cancellations.is_empty()
    }

    /// Classifies the saga's terminal failure.
    pub fn into_error(self, failed_bookings: Vec<BookingFailure>) -> TripError {
        if self.all_compensated() {
            TripError::BookingsFailedAllCompensated { failed_bookings }
        } else {
            TripError::BookingsFailedCompensationFailed {
                failed_bookings,
                failed_cancellations: self.failed_cancellations,
            }
        }
    }
}

/// Cancels all three branches concurrently and waits for every outcome.
///
/// Branches whose booking failed are cancelled too, with an empty id: a
/// failed booking may still have created a reservation.
pub async fn compensate_all(
    ctx: &WorkflowContext,
    user_id: &UserId,
    bookings: &PartialBookings,
) -> Result<CompensationOutcome, WorkflowError> {
    let handles: Vec<_> = BRANCHES
        .iter()
        .map(|branch| {
            let booking_id = bookings.cancellation_id(branch.kind);
            ctx.execute(&branch.cancel, (user_id.to_string(), booking_id.into()))
        })
        .collect();
    let outcomes = join_all(handles).await;

    let mut outcome = CompensationOutcome::default();
    for (branch, result) in BRANCHES.iter().zip(outcomes) {
        match result {
            Ok(()) => {}
            Err(WorkflowError::Activity(failure)) => {
                outcome.failed_cancellations.push(CancellationFailure {
                    branch: branch.kind,
                    reason: failure.to_string(),
                })
            }
            Err(err) => return Err(err),
        }
    }
    Ok(outcome)
}
