use core_config::tracing::{init_tracing, install_color_eyre};
use database::mongodb::connect_from_config_with_retry;
use domain_events::indexes::{IndexManager, MongoIndexAuditLog, MongoIndexStore};
use tracing::info;

mod api;
mod config;
mod openapi;
mod server;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment, &config.app);

    info!(
        url = %config.mongodb.redacted_url(),
        database = config.mongodb.database(),
        "Connecting to MongoDB"
    );

    // Unreachable store at boot is fatal.
    let client = connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = client.database(config.mongodb.database());

    let manager = IndexManager::new(MongoIndexStore::new(&db), MongoIndexAuditLog::new(&db));
    manager.init_indexes().await;

    let state = AppState::new(client, &config);
    let app = server::create_router::<openapi::ApiDoc>(
        api::routes(&state),
        &config.cors_origins,
        config.server.request_timeout,
    )?;

    info!(
        name = config.app.name,
        version = config.app.version,
        retention = ?config.retention,
        "Starting events aggregator"
    );

    let profiler = state.profiler.clone();
    server::serve(app, &config.server, async move {
        if profiler.has_scheduled_stop() {
            info!(task = %profiler.task_name(), "Abandoning scheduled profiler auto-stop");
        }
        drop(state.client);
        info!("MongoDB client released");
    })
    .await?;

    info!("Events aggregator shutdown complete");
    Ok(())
}
