//! Booking fan-out and fan-in.

use std::collections::BTreeMap;

use common::{BookingId, UserId};
use engine::{WorkflowContext, WorkflowError};
use futures_util::future::join_all;

use crate::branch::{BRANCHES, TripBranch};
use crate::error::BookingFailure;
use crate::trip::Trip;

/// Booking ids obtained by a fan-out that did not fully succeed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialBookings {
    /// Ids of the branches that succeeded.
    pub booked: BTreeMap<TripBranch, BookingId>,
    /// The branches that failed, in branch order.
    pub failures: Vec<BookingFailure>,
}

impl PartialBookings {
    /// Returns the id to cancel for a branch; empty if it never produced one.
    pub fn cancellation_id(&self, branch: TripBranch) -> BookingId {
        self.booked.get(&branch).cloned().unwrap_or_else(BookingId::none)
    }
}

/// Result of waiting for all three bookings.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingVerdict {
    Booked(Trip),
    Failed(PartialBookings),
}

/// Dispatches every booking, then waits for all of them.
///
/// A failing branch does not cancel its siblings; the verdict is computed
/// only after every outcome has arrived. Errors other than activity
/// failures are engine faults and are returned as-is.
pub async fn book_all(
    ctx: &WorkflowContext,
    user_id: &UserId,
) -> Result<BookingVerdict, WorkflowError> {
    let handles: Vec<_> = BRANCHES
        .iter()
        .map(|branch| ctx.execute(&branch.book, (user_id.to_string(),)))
        .collect();
    let outcomes = join_all(handles).await;

    let mut partial = PartialBookings::default();
    for (branch, outcome) in BRANCHES.iter().zip(outcomes) {
        match outcome {
            Ok(id) if !id.is_empty() => {
                partial.booked.insert(branch.kind, BookingId::new(id));
            }
            Ok(_) => partial.failures.push(BookingFailure {
                branch: branch.kind,
                reason: "booking returned an empty id".to_string(),
            }),
            Err(WorkflowError::Activity(failure)) => partial.failures.push(BookingFailure {
                branch: branch.kind,
                reason: failure.to_string(),
            }),
            Err(err) => return Err(err),
        }
    }

    if partial.failures.is_empty()
        && let (Some(car), Some(hotel), Some(flight)) = (
            partial.booked.get(&TripBranch::Car),
            partial.booked.get(&TripBranch::Hotel),
            partial.booked.get(&TripBranch::Flight),
        )
    {
        return Ok(BookingVerdict::Booked(Trip {
            car_booking_id: car.clone(),
            hotel_booking_id: hotel.clone(),
            flight_booking_id: flight.clone(),
        }));
    }

    Ok(BookingVerdict::Failed(partial))
}
