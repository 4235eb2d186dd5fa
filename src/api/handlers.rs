//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde_json::Value;

use super::AppState;
use super::types::{DemandRowDto, ErrorResponse, EventsQuery, HourQuery};
use crate::demand::HOURS_PER_DAY;
use crate::io::export::tensor_geojson;
use crate::sim::event::ChargingEvent;
use crate::summary::RunSummary;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_hour(hour: u32) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("`hour` ({hour}) must be in 0..{HOURS_PER_DAY}"),
        }),
    )
}

/// `GET /summary` → 200 + `RunSummary` JSON
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<RunSummary> {
    Json(state.summary.clone())
}

/// Returns demand tensor rows, optionally for a single hour.
///
/// `GET /demand` → 200 + all rows, hour-major
/// `GET /demand?hour=H` → rows for hour `H`
/// `GET /demand?hour=24` → 400 + `ErrorResponse`
pub async fn get_demand(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HourQuery>,
) -> Result<Json<Vec<DemandRowDto>>, ApiError> {
    let rows = match query.hour {
        Some(hour) => state.tensor.hour_rows(hour).ok_or_else(|| bad_hour(hour))?,
        None => state.tensor.rows(),
    };
    Ok(Json(rows.iter().map(DemandRowDto::from).collect()))
}

/// Returns the grid as a GeoJSON `FeatureCollection`.
///
/// Without `hour`, cell properties are totals over the day.
pub async fn get_demand_geojson(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HourQuery>,
) -> Result<Json<Value>, ApiError> {
    match tensor_geojson(&state.tensor, query.hour) {
        Some(collection) => Ok(Json(collection)),
        None => Err(bad_hour(query.hour.unwrap_or(HOURS_PER_DAY))),
    }
}

/// `GET /events?vehicle_id=ID` → 200 + events for that vehicle, or all events
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<ChargingEvent>> {
    let events = state
        .events
        .iter()
        .filter(|e| query.vehicle_id.as_deref().is_none_or(|id| e.vehicle_id == id))
        .cloned()
        .collect();
    Json(events)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use h3o::Resolution;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::demand::hexgrid::to_cell;
    use crate::demand::{AggregationSpec, GeoPoint, HexGrid, SpatialAggregator, resample};
    use crate::sim::fleet::FleetRun;

    fn make_test_state() -> Arc<AppState> {
        let point = GeoPoint::new(34.05, -118.25);
        let cell = to_cell(point, Resolution::Eight).expect("valid point");
        let grid = HexGrid::from_cells(cell.grid_disk::<Vec<_>>(1), 8).expect("valid cells");

        let start = NaiveDate::from_ymd_opt(2021, 3, 1)
            .and_then(|d| d.and_hms_opt(17, 30, 0))
            .expect("valid timestamp");
        let events = vec![
            ChargingEvent {
                vehicle_id: "veh-0001".to_string(),
                latitude: point.latitude,
                longitude: point.longitude,
                start_time: start,
                end_time: start + chrono::TimeDelta::minutes(60),
                delta_soc: 40.0,
                start_soc: 30.0,
                energy_kwh: 22.0,
            },
            ChargingEvent {
                vehicle_id: "veh-0002".to_string(),
                latitude: point.latitude,
                longitude: point.longitude,
                start_time: start,
                end_time: start + chrono::TimeDelta::minutes(20),
                delta_soc: 10.0,
                start_soc: 70.0,
                energy_kwh: 5.5,
            },
        ];

        let hourly = resample(&events);
        let (tensor, report) = SpatialAggregator::new(grid, AggregationSpec::default())
            .aggregate(&hourly)
            .expect("aggregation succeeds");
        let fleet = FleetRun::default();
        let summary = RunSummary::from_run(&fleet, &hourly, &tensor, &report);

        Arc::new(AppState {
            summary,
            tensor,
            events,
        })
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(make_test_state());
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn summary_returns_200() {
        let (status, json) = get_json("/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["grid_cells"], 7);
        assert_eq!(json["tensor_rows"], 7 * 24);
    }

    #[tokio::test]
    async fn demand_returns_all_rows() {
        let (status, json) = get_json("/demand").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(7 * 24));
    }

    #[tokio::test]
    async fn demand_hour_query() {
        let (status, json) = get_json("/demand?hour=17").await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().expect("array body");
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r["hour"] == 17));
        let energy: f64 = rows.iter().filter_map(|r| r["energy_kwh"].as_f64()).sum();
        // 30 of 60 minutes and all 20 of 20 minutes fall in hour 17
        assert!((energy - (11.0 + 5.5)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn demand_invalid_hour_returns_400() {
        let (status, json) = get_json("/demand?hour=24").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn geojson_has_one_feature_per_cell() {
        let (status, json) = get_json("/demand/geojson?hour=18").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().map(Vec::len), Some(7));

        let (status, _) = get_json("/demand/geojson?hour=30").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn events_filter_by_vehicle() {
        let (status, json) = get_json("/events?vehicle_id=veh-0002").await;
        assert_eq!(status, StatusCode::OK);
        let events = json.as_array().expect("array body");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["vehicle_id"], "veh-0002");

        let (_, all) = get_json("/events").await;
        assert_eq!(all.as_array().map(Vec::len), Some(2));
    }
}
