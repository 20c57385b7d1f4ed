//! The saga's success artifact.

use common::BookingId;
use serde::{Deserialize, Serialize};

/// A fully booked trip.
///
/// Only built once all three bookings returned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub car_booking_id: BookingId,
    pub hotel_booking_id: BookingId,
    pub flight_booking_id: BookingId,
}

impl std::fmt::Display for Trip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "car={} hotel={} flight={}",
            self.car_booking_id, self.hotel_booking_id, self.flight_booking_id
        )
    }
}
