//! Trip saga error types.

use engine::{WorkflowError, WorkflowFailure};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::branch::TripBranch;

/// A booking branch that did not produce an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{branch} booking failed: {reason}")]
pub struct BookingFailure {
    pub branch: TripBranch,
    pub reason: String,
}

/// A cancellation that did not complete within its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{branch} cancellation failed: {reason}")]
pub struct CancellationFailure {
    pub branch: TripBranch,
    pub reason: String,
}

/// Terminal failures of a trip booking, plus the errors that prevent one
/// from being decided.
#[derive(Debug, Error)]
pub enum TripError {
    /// At least one booking failed; every cancellation succeeded.
    #[error("Failed to complete bookings. All bookings canceled.")]
    BookingsFailedAllCompensated { failed_bookings: Vec<BookingFailure> },

    /// At least one booking failed and at least one cancellation failed, so
    /// a reservation may still exist.
    #[error("Failed to complete bookings. Failed to cancel bookings.")]
    BookingsFailedCompensationFailed {
        failed_bookings: Vec<BookingFailure>,
        failed_cancellations: Vec<CancellationFailure>,
    },

    /// The user id was empty or blank.
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    /// The engine could not drive the run to an outcome.
    #[error("Engine error: {0}")]
    Engine(WorkflowError),
}

/// Convenience type alias for trip results.
pub type Result<T> = std::result::Result<T, TripError>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FailureDetails {
    #[serde(default)]
    failed_bookings: Vec<BookingFailure>,
    #[serde(default)]
    failed_cancellations: Vec<CancellationFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl TripError {
    pub const ALL_COMPENSATED: &'static str = "BookingsFailedAllCompensated";
    pub const COMPENSATION_FAILED: &'static str = "BookingsFailedCompensationFailed";
    pub const INVALID_USER_ID: &'static str = "InvalidUserId";
    pub const ENGINE: &'static str = "EngineError";

    /// Returns the error kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            TripError::BookingsFailedAllCompensated { .. } => Self::ALL_COMPENSATED,
            TripError::BookingsFailedCompensationFailed { .. } => Self::COMPENSATION_FAILED,
            TripError::InvalidUserId(_) => Self::INVALID_USER_ID,
            TripError::Engine(_) => Self::ENGINE,
        }
    }

    /// Returns true if a reservation may have been left behind.
    pub fn needs_remediation(&self) -> bool {
        matches!(self, TripError::BookingsFailedCompensationFailed { .. })
    }

    /// Returns true for the two classified saga outcomes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TripError::BookingsFailedAllCompensated { .. }
                | TripError::BookingsFailedCompensationFailed { .. }
        )
    }

    pub fn failed_bookings(&self) -> &[BookingFailure] {
        match self {
            TripError::BookingsFailedAllCompensated { failed_bookings }
            | TripError::BookingsFailedCompensationFailed {
                failed_bookings, ..
            } => failed_bookings,
            _ => &[],
        }
    }

    pub fn failed_cancellations(&self) -> &[CancellationFailure] {
        match self {
            TripError::BookingsFailedCompensationFailed {
                failed_cancellations,
                ..
            } => failed_cancellations,
            _ => &[],
        }
    }
}

impl From<TripError> for WorkflowError {
    fn from(err: TripError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            TripError::BookingsFailedAllCompensated { failed_bookings } => {
                let details = FailureDetails {
                    failed_bookings,
                    ..Default::default()
                };
                failed(kind, message, &details)
            }
            TripError::BookingsFailedCompensationFailed {
                failed_bookings,
                failed_cancellations,
            } => {
                let details = FailureDetails {
                    failed_bookings,
                    failed_cancellations,
                    ..Default::default()
                };
                failed(kind, message, &details)
            }
            TripError::InvalidUserId(user_id) => {
                let details = FailureDetails {
                    user_id: Some(user_id),
                    ..Default::default()
                };
                failed(kind, message, &details)
            }
            TripError::Engine(err) => err,
        }
    }
}

fn failed(kind: &str, message: String, details: &FailureDetails) -> WorkflowError {
    let details = serde_json::to_value(details).unwrap_or_default();
    WorkflowError::Failed(WorkflowFailure::new(kind, message).with_details(details))
}

impl From<WorkflowError> for TripError {
    fn from(err: WorkflowError) -> Self {
        let WorkflowError::Failed(failure) = err else {
            return TripError::Engine(err);
        };
        let kind = failure.kind.as_str();
        if ![Self::ALL_COMPENSATED, Self::COMPENSATION_FAILED, Self::INVALID_USER_ID].contains(&kind) {
            return TripError::Engine(WorkflowError::Failed(failure));
        }

        let details: FailureDetails =
            serde_json::from_value(failure.details.clone()).unwrap_or_default();
        match kind {
            Self::ALL_COMPENSATED => TripError::BookingsFailedAllCompensated {
                failed_bookings: details.failed_bookings,
            },
            Self::COMPENSATION_FAILED => TripError::BookingsFailedCompensationFailed {
                failed_bookings: details.failed_bookings,
                failed_cancellations: details.failed_cancellations,
            },
            _ => TripError::InvalidUserId(details.user_id.unwrap_or_default()),
        }
    }
}
