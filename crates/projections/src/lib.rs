//! Read models over the run history.
//!
//! - [`Projection`] trait for processing history records into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding records from the store to projections
//! - [`TripRunsView`]: one summary per `book-trip` run, including the runs
//!   whose compensation failed and need remediation

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{TripRunSummary, TripRunsView};
