use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::models::forecast::{
    EnergyBucket, ForecastSnapshot, ForecastSummary, HealthResponse, PowerResponse,
};
use crate::models::site::SiteModel;
use crate::services::series_resolver;
use crate::shared_state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PowerQuery {
    /// RFC 3339 instant, defaults to now
    pub at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HourQuery {
    /// RFC 3339 start of the clock hour
    pub start: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// RFC 3339 instant to resolve the views at, defaults to now
    pub at: Option<DateTime<FixedOffset>>,
}

fn no_forecast() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"error": "No forecast available yet"})),
    )
        .into_response()
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// GET /api/forecast/power
/// Stepped power lookup
///
/// Returns the power of the last forecast point at or before `at`. Before the
/// first point the power is `null`.
#[utoipa::path(
    get,
    path = "/api/forecast/power",
    params(PowerQuery),
    responses(
        (status = 200, description = "Forecast power at the requested instant", body = PowerResponse),
        (status = 503, description = "No forecast has been built yet")
    )
)]
pub async fn get_power(State(state): State<AppState>, Query(query): Query<PowerQuery>) -> Response {
    let Some(snapshot) = state.store.current() else {
        return no_forecast();
    };
    let at = query.at.unwrap_or_else(now);
    Json(PowerResponse {
        at,
        power_w: series_resolver::power_now(&snapshot.forecast.series, at),
        version: snapshot.version,
    })
    .into_response()
}

/// GET /api/forecast/energy/hour
/// Energy of one clock hour
///
/// Returns the bucket starting at `start`, or `null` when the forecast does not
/// fully cover that hour.
#[utoipa::path(
    get,
    path = "/api/forecast/energy/hour",
    params(HourQuery),
    responses(
        (status = 200, description = "Hourly energy bucket, null when the hour is not fully covered", body = EnergyBucket),
        (status = 503, description = "No forecast has been built yet")
    )
)]
pub async fn get_hour_energy(State(state): State<AppState>, Query(query): Query<HourQuery>) -> Response {
    let Some(snapshot) = state.store.current() else {
        return no_forecast();
    };
    Json(series_resolver::energy_for_hour(&snapshot.forecast, query.start)).into_response()
}

/// GET /api/forecast/summary
/// Sensor-style views
///
/// Power in the next minutes and hours, energy per hour and per day, peak
/// times and the effect of the cloud correction.
#[utoipa::path(
    get,
    path = "/api/forecast/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Resolved views", body = ForecastSummary),
        (status = 503, description = "No forecast has been built yet")
    )
)]
pub async fn get_summary(State(state): State<AppState>, Query(query): Query<SummaryQuery>) -> Response {
    let Some(snapshot) = state.store.current() else {
        return no_forecast();
    };
    let at = query.at.unwrap_or_else(now);
    Json(series_resolver::summarize(&snapshot.forecast, snapshot.version, at)).into_response()
}

/// GET /api/forecast/series
/// Full forecast snapshot
#[utoipa::path(
    get,
    path = "/api/forecast/series",
    responses(
        (status = 200, description = "Current snapshot with points, buckets and day totals", body = ForecastSnapshot),
        (status = 503, description = "No forecast has been built yet")
    )
)]
pub async fn get_series(State(state): State<AppState>) -> Response {
    match state.store.current() {
        Some(snapshot) => Json(snapshot.as_ref()).into_response(),
        None => no_forecast(),
    }
}

/// GET /api/arrays
/// List the configured sub-arrays
#[utoipa::path(
    get,
    path = "/api/arrays",
    responses(
        (status = 200, description = "Validated sub-arrays", body = Vec<SiteModel>)
    )
)]
pub async fn list_arrays(State(sites): State<Arc<Vec<SiteModel>>>) -> impl IntoResponse {
    Json(sites.as_ref().clone())
}

/// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.current();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        offline: state.offline,
        snapshot_version: snapshot.as_ref().map(|s| s.version),
        snapshot_built_at: snapshot.as_ref().map(|s| s.built_at),
    })
}
