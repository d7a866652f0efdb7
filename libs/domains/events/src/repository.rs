//! Event repository trait

use crate::error::Result;
use crate::models::{DailyStatistics, Event, EventFilter, Pagination, TypeAggregate};
use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

/// Repository trait for event storage operations
#[async_trait]
pub trait EventRepository: Send + Sync + 'static {
    /// Store a new event
    async fn create(&self, event: Event) -> Result<Event>;

    /// Store multiple events; ids come back in input order
    async fn bulk_create(&self, events: Vec<Event>) -> Result<Vec<ObjectId>>;

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<Event>>;

    async fn get_by_ids(&self, ids: Vec<ObjectId>) -> Result<Vec<Event>>;

    /// List events matching `filter`, sorted then paginated
    async fn list(
        &self,
        filter: EventFilter,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>>;

    async fn count(&self, filter: EventFilter, now: DateTime<Utc>) -> Result<u64>;

    /// Distinct event types
    async fn event_types(&self) -> Result<Vec<String>>;

    /// Events created at or after `since`, newest first
    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<Event>>;

    /// Count and latest timestamp per type, largest count first
    async fn aggregate_by_type(&self) -> Result<Vec<TypeAggregate>>;

    /// Per-day totals for events created at or after `since`
    async fn daily_statistics(&self, since: DateTime<Utc>) -> Result<Vec<DailyStatistics>>;

    /// Set `processed` and bump `updated_at`
    async fn mark_processed(&self, id: ObjectId, at: DateTime<Utc>) -> Result<Option<Event>>;

    /// Unprocessed events, oldest first
    async fn unprocessed(&self, limit: i64) -> Result<Vec<Event>>;
}
