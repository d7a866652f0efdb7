//! Events Domain
//!
//! Event storage and administration on MongoDB:
//! - severity-based retention (`expires_at` plus a TTL index)
//! - idempotent index bootstrap with a persisted audit trail
//! - query profiler controls with a cancellable auto-stop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  startup:  IndexManager ──► IndexStore ──► events indexes    │
//! │                        └──► IndexAuditLog ──► index_metrics   │
//! │                                                              │
//! │  /events ──► EventService ──► EventRepository ──► events     │
//! │                  │                                           │
//! │                  └── RetentionPolicy (severity → expires_at) │
//! │                                                              │
//! │  /admin/profiler ──► ProfilerService ──► ProfilerBackend     │
//! │                          └── ProfilerState + auto-stop task  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use utoipa::OpenApi;

mod clock;
mod crud;
mod error;
mod generator;
pub mod handlers;
mod health;
pub mod indexes;
mod models;
mod mongodb;
pub mod profiler;
mod repository;
mod service;
mod ttl;

pub use clock::{Clock, SystemClock};
pub use crud::{CrudRepository, Entity, FindQuery, MongoCrud, SortOrder};
pub use error::{ErrorResponse, EventError, Result};
pub use generator::{CRITICAL_SEVERITIES, EventGenerator};
pub use handlers::{events_router, health_router, profiler_router};
pub use health::{ConnectionsReport, HealthService, Liveness, Readiness};
pub use models::{
    CountResponse, CreateEvent, DailyStatistics, Event, EventFilter, EventQuery, EventResponse,
    GenerateTestDataRequest, GenerateTestDataResponse, Pagination, Priority, TypeAggregate,
};
pub use self::mongodb::MongoEventRepository;
pub use repository::EventRepository;
pub use service::{
    DEFAULT_DAILY_DAYS, DEFAULT_RECENT_HOURS, DEFAULT_UNPROCESSED_LIMIT, EventService,
};
pub use ttl::{RetentionConfig, RetentionPolicy, RetentionTier, SeverityValue};

/// OpenAPI documentation for the events API
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::events::list_events,
        handlers::events::create_event,
        handlers::events::create_events,
        handlers::events::count_events,
        handlers::events::event_types,
        handlers::events::recent_events,
        handlers::events::stats_by_type,
        handlers::events::stats_daily,
        handlers::events::unprocessed_events,
        handlers::events::generate_test_data,
        handlers::events::get_event,
        handlers::events::mark_processed,
    ),
    components(schemas(
        CreateEvent,
        EventResponse,
        CountResponse,
        TypeAggregate,
        DailyStatistics,
        GenerateTestDataRequest,
        GenerateTestDataResponse,
        Priority,
        SortOrder,
        ErrorResponse,
    )),
    tags(
        (name = "events", description = "Event ingestion, queries and statistics")
    )
)]
pub struct ApiDoc;

/// OpenAPI documentation for the profiler administration API
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::admin::start_profiler,
        handlers::admin::stop_profiler,
        handlers::admin::profiler_status,
        handlers::admin::profiler_raw_data,
    ),
    components(schemas(
        profiler::StartProfilerRequest,
        profiler::ProfilerStatus,
        ErrorResponse,
    )),
    tags(
        (name = "admin", description = "Database profiler controls")
    )
)]
pub struct AdminApiDoc;

/// OpenAPI documentation for health probes
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health::liveness, handlers::health::readiness),
    components(schemas(Liveness, Readiness, ConnectionsReport)),
    tags(
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct HealthApiDoc;
