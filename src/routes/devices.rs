//! Device registration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::ApiError;
use crate::{Device, NewDevice, WeatherError, WeatherService};

// ---

pub fn router() -> Router<WeatherService> {
    // ---
    Router::new()
        .route("/api/v1/devices", post(create))
        .route("/api/v1/devices/{device_id}", get(fetch))
}

async fn create(
    State(service): State<WeatherService>,
    Json(device): Json<NewDevice>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    // ---
    info!("POST /api/v1/devices - location={}", device.location);
    let device = service.register_device(device).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

async fn fetch(
    State(service): State<WeatherService>,
    Path(device_id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    // ---
    service
        .store()
        .device_by_id(device_id)
        .await?
        .map(Json)
        .ok_or_else(|| WeatherError::DeviceNotFound(device_id).into())
}
