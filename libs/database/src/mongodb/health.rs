use mongodb::{Client, bson::Document, bson::doc};
use serde::Serialize;
use std::time::{Duration, Instant};

use super::connector::ping;
use crate::common::{DatabaseError, DatabaseResult};

/// Outcome of a timed `ping`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Error details when unhealthy
    pub message: Option<String>,
    pub response_time_ms: u64,
}

/// Connection counters reported by `serverStatus`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub current: i64,
    pub available: i64,
    pub total_created: i64,
}

impl ConnectionStats {
    fn from_server_status(status: &Document) -> Self {
        let Ok(connections) = status.get_document("connections") else {
            return Self::default();
        };
        Self {
            current: read_number(connections, "current"),
            available: read_number(connections, "available"),
            total_created: read_number(connections, "totalCreated"),
        }
    }
}

/// Numeric fields come back as int32, int64 or double depending on server version.
fn read_number(doc: &Document, key: &str) -> i64 {
    match doc.get(key) {
        Some(mongodb::bson::Bson::Int32(v)) => i64::from(*v),
        Some(mongodb::bson::Bson::Int64(v)) => *v,
        Some(mongodb::bson::Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

/// Ping with timing information and error details.
pub async fn check_health_detailed(
    client: &Client,
    database: &str,
    timeout: Duration,
) -> HealthStatus {
    let start = Instant::now();
    let result = ping(client, database, timeout).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}

/// Read connection pool counters from the `admin` database's `serverStatus`.
pub async fn connection_stats(client: &Client) -> DatabaseResult<ConnectionStats> {
    let status = client
        .database("admin")
        .run_command(doc! { "serverStatus": 1 })
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;

    Ok(ConnectionStats::from_server_status(&status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_stats_from_server_status() {
        let status = doc! {
            "ok": 1.0,
            "connections": {
                "current": 12_i32,
                "available": 838_848_i64,
                "totalCreated": 40.0,
            }
        };

        let stats = ConnectionStats::from_server_status(&status);
        assert_eq!(
            stats,
            ConnectionStats {
                current: 12,
                available: 838_848,
                total_created: 40,
            }
        );
    }

    #[test]
    fn test_connection_stats_missing_section() {
        let stats = ConnectionStats::from_server_status(&doc! { "ok": 1.0 });
        assert_eq!(stats, ConnectionStats::default());
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_check_health_detailed() {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let status = check_health_detailed(&client, "admin", Duration::from_secs(2)).await;
        assert!(status.healthy);
        assert!(status.message.is_none());
    }
}
