//! Trip booking and run inspection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::RunId;
use history::{HistoryRecord, HistoryStore};
use projections::TripRunSummary;
use serde::{Deserialize, Serialize};
use trip_saga::Trip;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct BookTripRequest {
    pub user_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct TripBookedResponse {
    pub run_id: RunId,
    pub trip: Trip,
}

// -- Handlers --

/// POST /trips: run the `book-trip` saga for a user and wait for its outcome.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BookTripRequest>,
) -> Result<(StatusCode, Json<TripBookedResponse>), ApiError> {
    let run_id = state.client.start(&req.user_id).await?;
    tracing::info!(%run_id, "trip booking started");

    let trip = state
        .client
        .result(run_id)
        .await
        .map_err(|error| ApiError::Trip {
            run_id: Some(run_id),
            error,
        })?;

    Ok((StatusCode::CREATED, Json(TripBookedResponse { run_id, trip })))
}

/// GET /trips/{run_id}: summary of one run from the read model.
#[tracing::instrument(skip(state))]
pub async fn get<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(run_id): Path<String>,
) -> Result<Json<TripRunSummary>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    state.catch_up().await?;

    state
        .trip_runs
        .get_run(run_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Trip run {run_id} not found")))
}

/// GET /trips/{run_id}/history: the run's raw history records.
#[tracing::instrument(skip(state))]
pub async fn history<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let records = state.history.read_run(run_id).await?;
    if records.is_empty() {
        return Err(ApiError::NotFound(format!("Trip run {run_id} not found")));
    }
    Ok(Json(records))
}

/// GET /remediation: failed runs whose compensation did not complete.
#[tracing::instrument(skip(state))]
pub async fn remediation<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<TripRunSummary>>, ApiError> {
    state.catch_up().await?;
    Ok(Json(state.trip_runs.pending_remediation().await))
}

fn parse_run_id(id: &str) -> Result<RunId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid run id: {e}")))?;
    Ok(RunId::from_uuid(uuid))
}
