//! Database library for the events aggregator.
//!
//! Wraps the official MongoDB driver with:
//!
//! - `mongodb` (default) - configuration, connection with a bounded ping check,
//!   retry with exponential backoff, health checks and pool statistics
//! - `config` - `core_config::FromEnv` support for [`mongodb::MongoConfig`]
//!
//! # Example
//!
//! ```ignore
//! use database::mongodb::{self, MongoConfig};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017", "events_aggregator");
//! let client = mongodb::connect_from_config_with_retry(&config, None).await?;
//! let db = client.database(config.database());
//! ```
//!
//! The client is only handed out after a successful ping, so there is no way to
//! hold a database handle that was never connected.

pub mod common;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult};
