//! Services shared by the HTTP handlers.

use std::sync::Arc;

use domain_events::profiler::{MongoProfilerBackend, ProfilerService};
use domain_events::{EventService, HealthService, MongoEventRepository, RetentionPolicy};
use mongodb::Client;

use crate::config::Config;

pub type Events = EventService<MongoEventRepository>;
pub type Profiler = ProfilerService<MongoProfilerBackend>;

/// Each field is cheap to clone; they share the client's connection pool.
#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub events: Arc<Events>,
    pub profiler: Profiler,
    pub health: HealthService,
}

impl AppState {
    pub fn new(client: Client, config: &Config) -> Self {
        let db = client.database(config.mongodb.database());

        let events = EventService::new(
            MongoEventRepository::new(&db),
            RetentionPolicy::new(config.retention),
        );
        let profiler = ProfilerService::new(MongoProfilerBackend::new(&db));
        let health = HealthService::new(client.clone(), config.mongodb.clone(), config.app.clone());

        Self {
            client,
            events: Arc::new(events),
            profiler,
            health,
        }
    }
}
