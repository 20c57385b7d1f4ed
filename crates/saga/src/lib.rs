//! Trip booking saga.
//!
//! Books a car, a hotel and a flight for a user concurrently. The saga
//! waits for all three outcomes; if any booking failed it cancels all three
//! bookings, including the ones that reported failure, and reports
//! whether every cancellation succeeded:
//!
//! ```text
//! Booking ──┬──► Completed(Trip)
//!           └──► Compensating ──┬──► Failed(BookingsFailedAllCompensated)
//!                               └──► Failed(BookingsFailedCompensationFailed)
//! ```
//!
//! The saga runs as the `book-trip` workflow on the durable [`engine`];
//! bookings and cancellations are named activities served on their own
//! task queue.

pub mod activities;
pub mod branch;
pub mod client;
pub mod compensation;
pub mod error;
pub mod fan_out;
pub mod names;
pub mod services;
pub mod state;
pub mod trip;
pub mod workflow;

use std::sync::Arc;

use engine::{ActivityOptions, Engine, TaskQueueRouter};
use history::HistoryStore;

pub use activities::TravelAgency;
pub use branch::{BRANCHES, Branch, TripBranch};
pub use client::TripBookingClient;
pub use compensation::CompensationOutcome;
pub use error::{BookingFailure, CancellationFailure, Result, TripError};
pub use fan_out::{BookingVerdict, PartialBookings};
pub use services::{
    InMemoryReservationService, ReservationCall, ReservationError, ReservationService,
};
pub use state::SagaState;
pub use trip::Trip;
pub use workflow::BookTripWorkflow;

/// Activity options matching the deployed workers: the activity task queue,
/// a 3 second start-to-close timeout and at most 3 attempts.
pub fn default_activity_options() -> ActivityOptions {
    ActivityOptions::new(names::TASK_QUEUE_ACTIVITIES)
}

/// Builds an engine hosting `book-trip` and the agency's activities.
pub fn new_engine<S: HistoryStore + Clone + 'static>(
    store: S,
    agency: &TravelAgency,
    options: ActivityOptions,
) -> Engine<S> {
    let mut router = TaskQueueRouter::new();
    router.serve(names::TASK_QUEUE_ACTIVITIES, agency.registry());

    let mut engine = Engine::new(store, Arc::new(router));
    engine.register_workflow(names::TASK_QUEUE_WORKFLOWS, BookTripWorkflow, options);
    engine
}
