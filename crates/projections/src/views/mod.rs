//! Read model views.

pub mod trip_runs;

pub use trip_runs::{TripRunSummary, TripRunsView};
