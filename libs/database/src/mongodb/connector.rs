use mongodb::{Client, bson::doc, options::ClientOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::MongoConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry, retry_with_backoff};

/// Build a client from the config and verify it with a bounded `ping`.
///
/// A malformed connection string is a [`DatabaseError::ConfigError`] and is
/// never retried. A ping that does not answer within the configured timeout is
/// a [`DatabaseError::Timeout`]; any other ping failure is
/// [`DatabaseError::ConnectionFailed`].
#[instrument(skip(config), fields(url = %config.redacted_url(), database = %config.database))]
pub async fn connect_from_config(config: &MongoConfig) -> DatabaseResult<Client> {
    info!("Connecting to MongoDB");

    let mut options = ClientOptions::parse(&config.url)
        .await
        .map_err(|e| DatabaseError::ConfigError(e.to_string()))?;

    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));

    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    let client = Client::with_options(options)?;
    ping(&client, config.database(), config.ping_timeout()).await?;

    info!("Connected to MongoDB");
    Ok(client)
}

/// [`connect_from_config`] with exponential backoff on transient failures.
pub async fn connect_from_config_with_retry(
    config: &MongoConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<Client> {
    match retry_config {
        Some(policy) => retry_with_backoff(|| connect_from_config(config), policy).await,
        None => retry(|| connect_from_config(config)).await,
    }
}

/// Run `{ ping: 1 }` against `database`, bounded by `timeout`.
pub async fn ping(client: &Client, database: &str, timeout: Duration) -> DatabaseResult<()> {
    let db = client.database(database);
    let command = db.run_command(doc! { "ping": 1 });

    match tokio::time::timeout(timeout, command).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => {
            warn!(error = %e, "MongoDB ping failed");
            Err(DatabaseError::ConnectionFailed(e.to_string()))
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "MongoDB ping timed out");
            Err(DatabaseError::Timeout(timeout))
        }
    }
}
