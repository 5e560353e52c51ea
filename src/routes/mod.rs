//! HTTP gateway (EMBP): each sibling module exports a subrouter, merged here
//! so `main.rs` only sees [`router`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error};

use crate::{WeatherError, WeatherService};

mod devices;
mod display;
mod health;
mod readings;

// ---

pub fn router(service: WeatherService) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(devices::router())
        .merge(readings::router())
        .merge(display::router())
        .with_state(service)
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Handler error, rendered as `{ "detail": ... }` with a status derived
/// from the failure.
#[derive(Debug)]
pub enum ApiError {
    Weather(WeatherError),
    NotFound(String),
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        ApiError::Weather(err)
    }
}

fn status_for(err: &WeatherError) -> StatusCode {
    // ---
    match err {
        WeatherError::DeviceNotFound(_) | WeatherError::NoReadingsFound { .. } => {
            StatusCode::NOT_FOUND
        }
        WeatherError::RoleNotPermitted { .. } => StatusCode::FORBIDDEN,
        WeatherError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_caller_input() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, detail) = match self {
            ApiError::Weather(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!("Request failed: {}", err);
                    // Store internals stay in the log.
                    (status, "internal server error".to_string())
                } else {
                    debug!("Request rejected ({}): {}", status, err);
                    (status, err.to_string())
                }
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
