//! Identifiers shared across the history, engine and saga crates.

pub mod types;

pub use types::{BookingId, RunId, UserId};
