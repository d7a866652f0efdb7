//! MongoDB connector and health helpers

mod config;
mod connector;
mod health;

pub use config::MongoConfig;
pub use connector::{connect_from_config, connect_from_config_with_retry, ping};
pub use health::{ConnectionStats, HealthStatus, check_health_detailed, connection_stats};

// Re-export MongoDB types for convenience
pub use mongodb::{Client, Collection, Database};
