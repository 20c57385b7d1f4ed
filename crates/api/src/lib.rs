//! HTTP server hosting the trip booking saga.
//!
//! Provides REST endpoints for booking trips and inspecting their runs,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::RunId;
use engine::WorkflowError;
use history::HistoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{ProjectionError, ProjectionProcessor, TripRunsView};
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trip_saga::{InMemoryReservationService, TravelAgency, TripBookingClient, TripBranch};

use config::Config;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to resume unfinished runs: {0}")]
    Recovery(#[from] WorkflowError),

    #[error("Failed to build read models: {0}")]
    Projection(#[from] ProjectionError),
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: HistoryStore + Clone + 'static> {
    pub client: TripBookingClient<S>,
    pub history: S,
    pub trip_runs: TripRunsView,
    /// Serializes catch-ups so each record reaches the view once.
    pub projections: Mutex<ProjectionProcessor<S>>,
}

impl<S: HistoryStore + Clone + 'static> AppState<S> {
    /// Builds the engine, client and read model around a history store.
    pub fn new(store: S, agency: &TravelAgency, config: &Config) -> Self {
        let engine = trip_saga::new_engine(store.clone(), agency, config.activity_options());
        let trip_runs = TripRunsView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(trip_runs.clone()));

        Self {
            client: TripBookingClient::new(Arc::new(engine)),
            history: store,
            trip_runs,
            projections: Mutex::new(processor),
        }
    }

    /// Brings the read model up to the head of the history.
    pub async fn catch_up(&self) -> projections::Result<()> {
        self.projections.lock().await.run_catch_up().await
    }

    /// Drives every run left open by a previous process to its outcome,
    /// then rebuilds the read model from the full history.
    pub async fn resume_unfinished_runs(&self) -> Result<Vec<RunId>, StartupError> {
        let resumed = self.client.engine().recover().await?;
        if !resumed.is_empty() {
            tracing::info!(runs = resumed.len(), "resumed unfinished runs");
        }
        self.catch_up().await?;
        Ok(resumed)
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: HistoryStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/trips", post(routes::trips::create::<S>))
        .route("/trips/{run_id}", get(routes::trips::get::<S>))
        .route("/trips/{run_id}/history", get(routes::trips::history::<S>))
        .route("/remediation", get(routes::trips::remediation::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the in-memory reservation services described by `config`.
pub fn create_agency(config: &Config) -> TravelAgency {
    let service = |branch: TripBranch| {
        let service = match branch {
            TripBranch::Car => InMemoryReservationService::car(),
            TripBranch::Hotel => InMemoryReservationService::hotel(),
            TripBranch::Flight => InMemoryReservationService::flight(),
        }
        .with_latency(config.activity_latency);
        service.set_fail_on_book(config.fail_bookings.contains(&branch));
        service
    };

    TravelAgency::new(
        service(TripBranch::Car),
        service(TripBranch::Hotel),
        service(TripBranch::Flight),
    )
}

/// Creates the default application state with in-memory reservation services.
pub fn create_default_state<S: HistoryStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, &create_agency(config), config))
}
