//! Administrative profiler endpoints

use crate::error::{ErrorResponse, EventError};
use crate::profiler::{ProfilerBackend, ProfilerService, ProfilerStatus, StartProfilerRequest};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;
use utoipa::IntoParams;

pub type AdminState<B> = ProfilerService<B>;

pub fn profiler_router<B: ProfilerBackend>() -> Router<AdminState<B>> {
    Router::new()
        .route("/start", post(start_profiler::<B>))
        .route("/stop", post(stop_profiler::<B>))
        .route("/status", get(profiler_status::<B>))
        .route("/raw-data", get(profiler_raw_data::<B>))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RawDataQuery {
    /// Number of `system.profile` entries (default 20)
    pub limit: Option<i64>,
}

/// Enable the profiler, optionally with an automatic stop
#[utoipa::path(
    post,
    path = "/start",
    request_body = StartProfilerRequest,
    responses(
        (status = 200, description = "Profiler status after the change", body = ProfilerStatus),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn start_profiler<B: ProfilerBackend>(
    State(state): State<AdminState<B>>,
    Json(request): Json<StartProfilerRequest>,
) -> Result<Json<ProfilerStatus>, EventError> {
    Ok(Json(state.start(request).await?))
}

/// Disable the profiler and cancel any scheduled stop
#[utoipa::path(
    post,
    path = "/stop",
    responses(
        (status = 200, description = "Profiler disabled", body = ProfilerStatus),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn stop_profiler<B: ProfilerBackend>(
    State(state): State<AdminState<B>>,
) -> Result<Json<ProfilerStatus>, EventError> {
    Ok(Json(state.stop().await?))
}

/// Current profiler configuration
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Profiler status", body = ProfilerStatus),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn profiler_status<B: ProfilerBackend>(
    State(state): State<AdminState<B>>,
) -> Result<Json<ProfilerStatus>, EventError> {
    Ok(Json(state.status().await?))
}

/// Latest profiled operations, newest first
#[utoipa::path(
    get,
    path = "/raw-data",
    params(RawDataQuery),
    responses(
        (status = 200, description = "Profiler entries", body = Vec<serde_json::Value>),
        (status = 400, description = "Invalid limit", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn profiler_raw_data<B: ProfilerBackend>(
    State(state): State<AdminState<B>>,
    Query(query): Query<RawDataQuery>,
) -> Result<Json<Vec<serde_json::Value>>, EventError> {
    Ok(Json(state.raw_data(query.limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::{MockProfilerBackend, ProfilerSnapshot};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(backend: MockProfilerBackend) -> Router {
        profiler_router().with_state(ProfilerService::new(backend))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_reports_verbose_level() {
        let mut backend = MockProfilerBackend::new();
        backend.expect_status().returning(|| {
            Ok(ProfilerSnapshot {
                level: 1,
                slowms: 250,
                sample_rate: None,
                stop_time: None,
            })
        });

        let request = Request::get("/status").body(Body::empty()).unwrap();
        let (status, body) = send(app(backend), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["level"], 1);
        assert_eq!(body["level_verbose"], "Slow operations only (>250ms)");
    }

    #[tokio::test]
    async fn test_start_rejects_both_stop_conditions() {
        let mut backend = MockProfilerBackend::new();
        backend.expect_set_level().never();

        let request = Request::post("/start")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"level":2,"timeout_minutes":5,"till":"2030-01-01T00:00:00Z"}"#,
            ))
            .unwrap();

        let (status, body) = send(app(backend), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_start_rejects_unrepresentable_timeout() {
        let mut backend = MockProfilerBackend::new();
        backend.expect_set_level().never();

        let request = Request::post("/start")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"level":2,"timeout_minutes":1000000000000}"#))
            .unwrap();

        let (status, body) = send(app(backend), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}
