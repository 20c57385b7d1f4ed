//! Fixed names shared with the workers serving the saga.

use engine::RemoteOperation;

pub const TASK_QUEUE_WORKFLOWS: &str = "booking-workflows";
pub const TASK_QUEUE_ACTIVITIES: &str = "booking-activities";

pub const WORKFLOW_BOOK_TRIP: &str = "book-trip";

pub const ACTIVITY_BOOK_CAR: &str = "book-car";
pub const ACTIVITY_BOOK_HOTEL: &str = "book-hotel";
pub const ACTIVITY_BOOK_FLIGHT: &str = "book-flight";
pub const ACTIVITY_CANCEL_CAR_BOOKING: &str = "cancel-car-booking";
pub const ACTIVITY_CANCEL_HOTEL_BOOKING: &str = "cancel-hotel-booking";
pub const ACTIVITY_CANCEL_FLIGHT_BOOKING: &str = "cancel-flight-booking";

/// `(user_id)` → booking id.
pub type BookOperation = RemoteOperation<(String,), String>;

/// `(user_id, booking_id)` → nothing. The booking id may be empty.
pub type CancelOperation = RemoteOperation<(String, String), ()>;

pub const BOOK_CAR: BookOperation = RemoteOperation::new(ACTIVITY_BOOK_CAR);
pub const BOOK_HOTEL: BookOperation = RemoteOperation::new(ACTIVITY_BOOK_HOTEL);
pub const BOOK_FLIGHT: BookOperation = RemoteOperation::new(ACTIVITY_BOOK_FLIGHT);
pub const CANCEL_CAR_BOOKING: CancelOperation = RemoteOperation::new(ACTIVITY_CANCEL_CAR_BOOKING);
pub const CANCEL_HOTEL_BOOKING: CancelOperation =
    RemoteOperation::new(ACTIVITY_CANCEL_HOTEL_BOOKING);
pub const CANCEL_FLIGHT_BOOKING: CancelOperation =
    RemoteOperation::new(ACTIVITY_CANCEL_FLIGHT_BOOKING);
