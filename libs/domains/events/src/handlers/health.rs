//! Liveness and readiness endpoints

use crate::health::{HealthService, Liveness, Readiness};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

pub fn health_router() -> Router<HealthService> {
    Router::new()
        .route("/", get(liveness))
        .route("/ready", get(readiness))
}

/// Process is up
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is alive", body = Liveness)
    ),
    tag = "health"
)]
pub async fn liveness(State(state): State<HealthService>) -> Json<Liveness> {
    Json(state.liveness())
}

/// MongoDB reachable within the ping timeout
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Ready to serve traffic", body = Readiness),
        (status = 503, description = "MongoDB unavailable", body = Readiness)
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<HealthService>) -> (StatusCode, Json<Readiness>) {
    let readiness = state.readiness().await;
    let status = if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}
