//! HTTP routers and handlers

pub mod admin;
pub mod events;
pub mod health;

pub use admin::{AdminState, profiler_router};
pub use events::{EventsState, events_router};
pub use health::health_router;
