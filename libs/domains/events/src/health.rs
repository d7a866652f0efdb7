//! Liveness and readiness reporting

use core_config::AppInfo;
use database::mongodb::{
    Client, ConnectionStats, HealthStatus, MongoConfig, check_health_detailed, connection_stats,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Liveness {
    pub status: String,
    pub name: String,
    pub version: String,
}

/// Pool counters from `serverStatus` plus the configured bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConnectionsReport {
    pub current: i64,
    pub available: i64,
    pub total_created: i64,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Readiness {
    /// `ready` or `unavailable`
    pub status: String,
    pub mongodb: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionsReport>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.mongodb
    }

    fn from_parts(
        health: HealthStatus,
        stats: Option<ConnectionStats>,
        config: &MongoConfig,
    ) -> Self {
        Self {
            status: if health.healthy { "ready" } else { "unavailable" }.to_string(),
            mongodb: health.healthy,
            response_time_ms: health.response_time_ms,
            error: health.message,
            connections: stats.map(|stats| ConnectionsReport {
                current: stats.current,
                available: stats.available,
                total_created: stats.total_created,
                max_pool_size: config.max_pool_size,
                min_pool_size: config.min_pool_size,
            }),
        }
    }
}

#[derive(Clone)]
pub struct HealthService {
    client: Client,
    config: MongoConfig,
    app: AppInfo,
}

impl HealthService {
    pub fn new(client: Client, config: MongoConfig, app: AppInfo) -> Self {
        Self {
            client,
            config,
            app,
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            status: "ok".to_string(),
            name: self.app.name.to_string(),
            version: self.app.version.to_string(),
        }
    }

    /// Ping MongoDB within the configured timeout and collect pool counters
    pub async fn readiness(&self) -> Readiness {
        let health =
            check_health_detailed(&self.client, self.config.database(), self.config.ping_timeout())
                .await;

        let stats = if health.healthy {
            match connection_stats(&self.client).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %e, "serverStatus unavailable");
                    None
                }
            }
        } else {
            warn!(error = ?health.message, "MongoDB not reachable");
            None
        };

        Readiness::from_parts(health, stats, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MongoConfig {
        MongoConfig::with_database("mongodb://localhost:27017", "events").with_pool_size(50, 2)
    }

    #[test]
    fn test_ready_includes_pool_sizes() {
        let health = HealthStatus {
            healthy: true,
            message: None,
            response_time_ms: 3,
        };
        let stats = ConnectionStats {
            current: 4,
            available: 96,
            total_created: 10,
        };

        let readiness = Readiness::from_parts(health, Some(stats), &config());
        assert!(readiness.is_ready());
        assert_eq!(readiness.status, "ready");
        let connections = readiness.connections.unwrap();
        assert_eq!(connections.current, 4);
        assert_eq!(connections.max_pool_size, 50);
        assert_eq!(connections.min_pool_size, 2);
    }

    #[test]
    fn test_unreachable_is_unavailable() {
        let health = HealthStatus {
            healthy: false,
            message: Some("timed out".to_string()),
            response_time_ms: 5000,
        };

        let readiness = Readiness::from_parts(health, None, &config());
        assert!(!readiness.is_ready());
        assert_eq!(readiness.status, "unavailable");
        assert_eq!(readiness.error.as_deref(), Some("timed out"));

        let body = serde_json::to_value(&readiness).unwrap();
        assert!(body.get("connections").is_none());
    }
}
