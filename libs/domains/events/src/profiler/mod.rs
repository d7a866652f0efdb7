//! Administrative control of the database query profiler.

mod backend;
mod models;
mod service;
mod state;

pub use backend::{MongoProfilerBackend, ProfilerBackend};
pub use models::{DEFAULT_SLOW_MS, ProfilerSnapshot, ProfilerStatus, StartProfilerRequest};
pub use service::{DEFAULT_RAW_DATA_LIMIT, ProfilerService};
pub use state::{AutoStopTask, ProfilerState};

#[cfg(test)]
pub(crate) use backend::MockProfilerBackend;
