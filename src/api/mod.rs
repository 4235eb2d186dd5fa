//! REST API over a finished pipeline run.
//!
//! Provides four GET endpoints:
//! - `/summary` - run summary statistics
//! - `/demand` - demand tensor rows, optionally for one hour
//! - `/demand/geojson` - per-cell demand polygons, optionally for one hour
//! - `/events` - simulated charging events, optionally for one vehicle

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::demand::DemandTensor;
use crate::sim::event::ChargingEvent;
use crate::summary::RunSummary;

pub use types::{DemandRowDto, ErrorResponse};

/// Immutable application state shared across all request handlers.
///
/// Built once after the run completes and wrapped in `Arc`; all data is
/// read-only.
pub struct AppState {
    pub summary: RunSummary,
    pub tensor: DemandTensor,
    pub events: Vec<ChargingEvent>,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/summary", get(handlers::get_summary))
        .route("/demand", get(handlers::get_demand))
        .route("/demand/geojson", get(handlers::get_demand_geojson))
        .route("/events", get(handlers::get_events))
        .with_state(state)
}

/// Binds to the given address and serves the API until the server stops.
///
/// # Errors
///
/// Returns an I/O error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
