//! Reservation service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use common::BookingId;
use thiserror::Error;

/// Errors reported by a reservation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("{resource} booking rejected for user {user_id}")]
    BookingRejected {
        resource: &'static str,
        user_id: String,
    },

    #[error("{resource} cancellation rejected for booking '{booking_id}'")]
    CancellationRejected {
        resource: &'static str,
        booking_id: BookingId,
    },
}

/// One remote resource that can be booked and cancelled.
#[async_trait]
pub trait ReservationService: Send + Sync {
    /// Books the resource for a user.
    async fn book(&self, user_id: &str) -> Result<BookingId, ReservationError>;

    /// Cancels a booking.
    ///
    /// Must succeed for an empty or unknown id: callers cancel branches
    /// whose booking may never have happened.
    async fn cancel(&self, user_id: &str, booking_id: &BookingId) -> Result<(), ReservationError>;
}

/// A call received by an in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationCall {
    Book { user_id: String },
    Cancel { user_id: String, booking_id: BookingId },
}

#[derive(Debug, Default)]
struct ReservationState {
    bookings: HashMap<BookingId, String>,
    calls: Vec<ReservationCall>,
    fixed_booking_id: Option<BookingId>,
    fail_on_book: bool,
    failing_books: u32,
    fail_on_cancel: bool,
}

/// In-memory reservation service for one resource.
///
/// Clones share state, so a test can keep a handle while the activities own
/// another.
#[derive(Debug, Clone)]
pub struct InMemoryReservationService {
    resource: &'static str,
    latency: Duration,
    state: Arc<RwLock<ReservationState>>,
}

impl InMemoryReservationService {
    /// Creates a service whose generated ids are prefixed with `resource`.
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            latency: Duration::ZERO,
            state: Arc::default(),
        }
    }

    pub fn car() -> Self {
        Self::new("car")
    }

    pub fn hotel() -> Self {
        Self::new("hotel")
    }

    pub fn flight() -> Self {
        Self::new("flight")
    }

    /// Delays every call by `latency` before it takes effect.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    fn read(&self) -> RwLockReadGuard<'_, ReservationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ReservationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every booking return this id instead of a generated one.
    pub fn set_fixed_booking_id(&self, booking_id: impl Into<String>) {
        self.write().fixed_booking_id = Some(BookingId::new(booking_id));
    }

    /// Configures the service to reject every booking.
    pub fn set_fail_on_book(&self, fail: bool) {
        self.write().fail_on_book = fail;
    }

    /// Rejects the next `count` bookings, then recovers.
    pub fn fail_next_books(&self, count: u32) {
        self.write().failing_books = count;
    }

    /// Configures the service to reject every cancellation.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.write().fail_on_cancel = fail;
    }

    /// Returns the number of active bookings.
    pub fn booking_count(&self) -> usize {
        self.read().bookings.len()
    }

    /// Returns true if a booking exists with the given id.
    pub fn has_booking(&self, booking_id: &str) -> bool {
        self.read()
            .bookings
            .contains_key(&BookingId::new(booking_id))
    }

    /// Returns every call received, in arrival order.
    pub fn calls(&self) -> Vec<ReservationCall> {
        self.read().calls.clone()
    }

    pub fn book_calls(&self) -> usize {
        self.read()
            .calls
            .iter()
            .filter(|c| matches!(c, ReservationCall::Book { .. }))
            .count()
    }

    /// Returns the booking ids passed to cancel, in arrival order.
    pub fn cancelled_ids(&self) -> Vec<BookingId> {
        self.read()
            .calls
            .iter()
            .filter_map(|c| match c {
                ReservationCall::Cancel { booking_id, .. } => Some(booking_id.clone()),
                ReservationCall::Book { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ReservationService for InMemoryReservationService {
    async fn book(&self, user_id: &str) -> Result<BookingId, ReservationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.write();
        state.calls.push(ReservationCall::Book {
            user_id: user_id.to_string(),
        });

        if state.failing_books > 0 || state.fail_on_book {
            state.failing_books = state.failing_books.saturating_sub(1);
            return Err(ReservationError::BookingRejected {
                resource: self.resource,
                user_id: user_id.to_string(),
            });
        }

        let booking_id = state
            .fixed_booking_id
            .clone()
            .unwrap_or_else(|| BookingId::new(format!("{}-{}", self.resource, uuid::Uuid::new_v4())));
        state.bookings.insert(booking_id.clone(), user_id.to_string());
        Ok(booking_id)
    }

    async fn cancel(&self, user_id: &str, booking_id: &BookingId) -> Result<(), ReservationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.write();
        state.calls.push(ReservationCall::Cancel {
            user_id: user_id.to_string(),
            booking_id: booking_id.clone(),
        });

        if state.fail_on_cancel {
            return Err(ReservationError::CancellationRejected {
                resource: self.resource,
                booking_id: booking_id.clone(),
            });
        }

        state.bookings.remove(booking_id);
        Ok(())
    }
}
