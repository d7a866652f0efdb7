//! HTTP handlers for the events API

use crate::error::{ErrorResponse, EventError};
use crate::models::{
    CountResponse, CreateEvent, DailyStatistics, Event, EventQuery, EventResponse,
    GenerateTestDataRequest, GenerateTestDataResponse, TypeAggregate,
};
use crate::repository::EventRepository;
use crate::service::EventService;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::IntoParams;
use validator::Validate;

/// Events router state
pub type EventsState<R> = Arc<EventService<R>>;

/// Create the events router
pub fn events_router<R: EventRepository>() -> Router<EventsState<R>> {
    Router::new()
        .route("/", get(list_events::<R>).post(create_event::<R>))
        .route("/bulk", post(create_events::<R>))
        .route("/count", get(count_events::<R>))
        .route("/types", get(event_types::<R>))
        .route("/recent", get(recent_events::<R>))
        .route("/stats/by-type", get(stats_by_type::<R>))
        .route("/stats/daily", get(stats_daily::<R>))
        .route("/unprocessed", get(unprocessed_events::<R>))
        .route("/gen-test-data", post(generate_test_data::<R>))
        .route("/{id}", get(get_event::<R>))
        .route("/{id}/processed", patch(mark_processed::<R>))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    /// Look-back window in hours (default 24)
    pub hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Number of days to cover (default 7)
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// Maximum number of items (default 100)
    pub limit: Option<i64>,
}

fn respond(events: Vec<Event>) -> Json<Vec<EventResponse>> {
    Json(events.into_iter().map(EventResponse::from).collect())
}

/// List events with filtering, sorting and pagination
#[utoipa::path(
    get,
    path = "/",
    params(EventQuery),
    responses(
        (status = 200, description = "List of events", body = Vec<EventResponse>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn list_events<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Query(query): Query<EventQuery>,
) -> Result<Json<Vec<EventResponse>>, EventError> {
    query.validate()?;
    let events = state
        .list_events(query.filter(), query.pagination())
        .await?;
    Ok(respond(events))
}

/// Create a new event
#[utoipa::path(
    post,
    path = "/",
    request_body = CreateEvent,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state, create), fields(event_type = %create.event_type))]
pub async fn create_event<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Json(create): Json<CreateEvent>,
) -> Result<impl IntoResponse, EventError> {
    let event = state.create_event(create).await?;
    Ok((StatusCode::CREATED, Json(EventResponse::from(event))))
}

/// Create multiple events in one insert
#[utoipa::path(
    post,
    path = "/bulk",
    request_body = Vec<CreateEvent>,
    responses(
        (status = 201, description = "Events created", body = Vec<EventResponse>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state, creates), fields(count = creates.len()))]
pub async fn create_events<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Json(creates): Json<Vec<CreateEvent>>,
) -> Result<impl IntoResponse, EventError> {
    let events = state.create_events(creates).await?;
    Ok((StatusCode::CREATED, respond(events)))
}

/// Count events matching the filter
#[utoipa::path(
    get,
    path = "/count",
    params(EventQuery),
    responses(
        (status = 200, description = "Event count", body = CountResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn count_events<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Query(query): Query<EventQuery>,
) -> Result<Json<CountResponse>, EventError> {
    query.validate()?;
    let count = state.count_events(query.filter()).await?;
    Ok(Json(CountResponse { count }))
}

/// Distinct event types
#[utoipa::path(
    get,
    path = "/types",
    responses(
        (status = 200, description = "Event types", body = Vec<String>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn event_types<R: EventRepository>(
    State(state): State<EventsState<R>>,
) -> Result<Json<Vec<String>>, EventError> {
    Ok(Json(state.event_types().await?))
}

/// Events created within the last N hours, newest first
#[utoipa::path(
    get,
    path = "/recent",
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent events", body = Vec<EventResponse>),
        (status = 400, description = "Invalid window", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn recent_events<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<EventResponse>>, EventError> {
    let events = state.recent_events(query.hours).await?;
    Ok(respond(events))
}

/// Count and latest occurrence per event type
#[utoipa::path(
    get,
    path = "/stats/by-type",
    responses(
        (status = 200, description = "Per-type aggregates", body = Vec<TypeAggregate>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn stats_by_type<R: EventRepository>(
    State(state): State<EventsState<R>>,
) -> Result<Json<Vec<TypeAggregate>>, EventError> {
    Ok(Json(state.aggregate_by_type().await?))
}

/// Per-day counts and distinct types
#[utoipa::path(
    get,
    path = "/stats/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Daily statistics", body = Vec<DailyStatistics>),
        (status = 400, description = "Invalid window", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn stats_daily<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<Vec<DailyStatistics>>, EventError> {
    Ok(Json(state.daily_statistics(query.days).await?))
}

/// Unprocessed events, oldest first
#[utoipa::path(
    get,
    path = "/unprocessed",
    params(LimitQuery),
    responses(
        (status = 200, description = "Unprocessed events", body = Vec<EventResponse>),
        (status = 400, description = "Invalid limit", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn unprocessed_events<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<EventResponse>>, EventError> {
    let events = state.unprocessed_events(query.limit).await?;
    Ok(respond(events))
}

/// Generate and store synthetic events
#[utoipa::path(
    post,
    path = "/gen-test-data",
    request_body = GenerateTestDataRequest,
    responses(
        (status = 201, description = "Test data created", body = GenerateTestDataResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state, request), fields(count = request.count))]
pub async fn generate_test_data<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Json(request): Json<GenerateTestDataRequest>,
) -> Result<impl IntoResponse, EventError> {
    let response = state.generate_test_data(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get event by ID
#[utoipa::path(
    get,
    path = "/{id}",
    params(
        ("id" = String, Path, description = "Event ObjectId (hex)")
    ),
    responses(
        (status = 200, description = "Event found", body = EventResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn get_event<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, EventError> {
    let event = state.get_event(&id).await?;
    Ok(Json(event.into()))
}

/// Mark an event as processed
#[utoipa::path(
    patch,
    path = "/{id}/processed",
    params(
        ("id" = String, Path, description = "Event ObjectId (hex)")
    ),
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn mark_processed<R: EventRepository>(
    State(state): State<EventsState<R>>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, EventError> {
    let event = state.mark_processed(&id).await?;
    Ok(Json(event.into()))
}
