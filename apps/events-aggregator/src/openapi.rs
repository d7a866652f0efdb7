//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for all APIs
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Events Aggregator API",
        version = "0.1.0",
        description = "Event ingestion with severity-based retention, index bootstrap and profiler controls"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/events", api = domain_events::ApiDoc),
        (path = "/api/admin/profiler", api = domain_events::AdminApiDoc),
        (path = "/api/health", api = domain_events::HealthApiDoc)
    )
)]
pub struct ApiDoc;
