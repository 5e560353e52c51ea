// src/routes/health.rs
//! API health check endpoint for the weatherstation backend.
//!
//! This module defines the `/health` route used by container orchestrators
//! (e.g., Docker, Kubernetes) and the boards' own provisioning scripts to
//! verify that the service is up. It is a sibling module in the `routes`
//! directory and follows the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::WeatherService;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// Handle `GET /health`.
///
/// The service itself always reports `healthy`; `database` reflects a single
/// round trip to the reading store so a broken pool is visible without
/// failing the probe.
async fn health(State(service): State<WeatherService>) -> Json<HealthResponse> {
    // ---
    let database = match service.store().ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Health check: store ping failed: {}", e);
            "unhealthy"
        }
    };
    Json(HealthResponse {
        status: "healthy",
        database,
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<WeatherService> {
    Router::new().route("/health", get(health))
}
