//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::RunId;
use engine::WorkflowError;
use projections::ProjectionError;
use serde_json::json;
use trip_saga::TripError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// A trip booking did not produce a trip.
    Trip {
        run_id: Option<RunId>,
        error: TripError,
    },
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Trip { run_id, error } => trip_error_to_response(run_id, error),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Business outcomes carry their kind and the failed branches so a client
/// can tell a clean rollback from one that needs remediation.
fn trip_error_to_response(run_id: Option<RunId>, err: TripError) -> Response {
    let status = match &err {
        TripError::BookingsFailedAllCompensated { .. } => StatusCode::CONFLICT,
        TripError::BookingsFailedCompensationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        TripError::InvalidUserId(_) => StatusCode::BAD_REQUEST,
        TripError::Engine(WorkflowError::RunNotFound(_)) => StatusCode::NOT_FOUND,
        TripError::Engine(_) => {
            tracing::error!(?run_id, error = %err, "trip booking run failed to complete");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = json!({
        "error": err.to_string(),
        "kind": err.kind(),
        "run_id": run_id,
        "failed_bookings": err.failed_bookings(),
        "failed_cancellations": err.failed_cancellations(),
    });
    (status, Json(body)).into_response()
}

impl From<TripError> for ApiError {
    fn from(error: TripError) -> Self {
        ApiError::Trip {
            run_id: None,
            error,
        }
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<history::HistoryError> for ApiError {
    fn from(err: history::HistoryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
