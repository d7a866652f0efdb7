use core_config::{AppInfo, FromEnv, app_info, env_or_default, server::ServerConfig};
use database::mongodb::MongoConfig;
use domain_events::RetentionConfig;

pub use core_config::Environment;

/// Application configuration composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub retention: RetentionConfig,
    /// Allowed CORS origins; empty disables cross-origin access
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let app = app_info!();

        let mut mongodb = MongoConfig::from_env()?;
        if mongodb.app_name.is_none() {
            mongodb = mongodb.with_app_name(app.name);
        }

        Ok(Self {
            app,
            environment: Environment::from_env(),
            mongodb,
            server: ServerConfig::from_env()?,
            retention: RetentionConfig::from_env()?,
            cors_origins: parse_origins(&env_or_default("CORS_ALLOWED_ORIGIN", "")),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
