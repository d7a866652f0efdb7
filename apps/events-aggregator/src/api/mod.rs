//! API routes, nested under `/api` by the server module

use axum::Router;
use domain_events::{events_router, health_router, profiler_router};

use crate::state::AppState;

pub fn routes(state: &AppState) -> Router {
    Router::new()
        .nest("/events", events_router().with_state(state.events.clone()))
        .nest(
            "/admin/profiler",
            profiler_router().with_state(state.profiler.clone()),
        )
        .nest("/health", health_router().with_state(state.health.clone()))
}
