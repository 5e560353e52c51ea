//! Read paths used by display boards: latest conditions, per-sensor
//! history and trailing summaries.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::{readings::ListParams, ApiError};
use crate::{LatestReadings, ReadingList, ReadingWithLocation, SummaryStats, WeatherService};

// ---

pub fn router() -> Router<WeatherService> {
    // ---
    Router::new()
        .route("/api/v1/display/latest", get(latest_all))
        .route("/api/v1/display/sensor/{device_id}/latest", get(latest_one))
        .route("/api/v1/display/sensor/{device_id}/history", get(history))
        .route("/api/v1/display/sensor/{device_id}/summary", get(summary))
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    #[serde(default = "default_hours")]
    hours: i64,
}

fn default_hours() -> i64 {
    24
}

async fn latest_all(State(service): State<WeatherService>) -> Result<Json<LatestReadings>, ApiError> {
    // ---
    let latest = service.latest_all_sensors().await?;
    info!("GET /api/v1/display/latest - {} sensors", latest.readings.len());
    Ok(Json(latest))
}

async fn latest_one(
    State(service): State<WeatherService>,
    Path(device_id): Path<i64>,
) -> Result<Json<ReadingWithLocation>, ApiError> {
    // ---
    service
        .latest_for_device(device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No readings found for device {device_id}")))
}

/// Aggregated by default; pass `auto_granularity=false` without a
/// granularity for raw readings.
async fn history(
    State(service): State<WeatherService>,
    Path(device_id): Path<i64>,
    Query(params): Query<ListParams>,
) -> Result<Json<ReadingList>, ApiError> {
    // ---
    info!("GET /api/v1/display/sensor/{}/history - {:?}", device_id, params);
    let list = service
        .readings(params.into_query(Some(device_id), true), true)
        .await?;
    Ok(Json(list))
}

async fn summary(
    State(service): State<WeatherService>,
    Path(device_id): Path<i64>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryStats>, ApiError> {
    // ---
    let summary = service.summary_for_device(device_id, params.hours).await?;
    Ok(Json(summary))
}
