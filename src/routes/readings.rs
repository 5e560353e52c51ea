//! Reading ingestion from sensor boards and the web UI's listing endpoint.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::ApiError;
use crate::{Granularity, NewReading, Reading, ReadingList, ReadingsQuery, WeatherService};

// ---

pub fn router() -> Router<WeatherService> {
    // ---
    Router::new()
        .route("/api/v1/devices/{device_id}/readings", post(submit))
        .route("/api/v1/readings", get(list))
}

/// Query parameters shared by the listing and history endpoints.
#[derive(Debug, Deserialize)]
pub(super) struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub granularity: Option<Granularity>,
    pub auto_granularity: Option<bool>,
}

fn default_limit() -> i64 {
    100
}

impl ListParams {
    /// `auto_default` applies when the caller did not pass `auto_granularity`.
    pub fn into_query(self, device_id: Option<i64>, auto_default: bool) -> ReadingsQuery {
        // ---
        ReadingsQuery {
            device_id,
            start: self.start_time,
            end: self.end_time,
            granularity: self.granularity,
            auto: self.auto_granularity.unwrap_or(auto_default),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

async fn submit(
    State(service): State<WeatherService>,
    Path(device_id): Path<i64>,
    Json(reading): Json<NewReading>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    // ---
    info!("POST /api/v1/devices/{}/readings", device_id);
    let stored = service.submit_reading(device_id, reading).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn list(
    State(service): State<WeatherService>,
    Query(params): Query<ListParams>,
) -> Result<Json<ReadingList>, ApiError> {
    // ---
    info!("GET /api/v1/readings - {:?}", params);
    let list = service.readings(params.into_query(None, false), false).await?;
    Ok(Json(list))
}
