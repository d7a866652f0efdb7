use std::time::Duration;

/// Unified error type for connection management and health checks
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Driver-level MongoDB error
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// The server answered but refused the connectivity check
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connectivity check did not complete in time
    #[error("Connection check timed out after {0:?}")]
    Timeout(Duration),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Configuration error (bad URI, invalid pool bounds)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DatabaseError {
    /// Whether retrying the same operation could plausibly succeed.
    ///
    /// Configuration mistakes never heal by themselves; connectivity problems might.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "mongodb")]
            Self::Mongo(_) => true,
            Self::ConnectionFailed(_) | Self::Timeout(_) | Self::HealthCheckFailed(_) => true,
            Self::ConfigError(_) => false,
        }
    }
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_not_transient() {
        assert!(!DatabaseError::ConfigError("bad uri".into()).is_transient());
    }

    #[test]
    fn test_timeouts_are_transient() {
        let err = DatabaseError::Timeout(Duration::from_secs(5));
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }
}
