//! Reservation services behind the booking activities.

pub mod reservation;

pub use reservation::{
    InMemoryReservationService, ReservationCall, ReservationError, ReservationService,
};
