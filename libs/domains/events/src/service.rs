//! Event service layer

use crate::clock::{self, Clock, SystemClock};
use crate::error::{EventError, Result};
use crate::generator::EventGenerator;
use crate::models::{
    CreateEvent, DailyStatistics, Event, EventFilter, GenerateTestDataRequest,
    GenerateTestDataResponse, Pagination, TypeAggregate,
};
use crate::repository::EventRepository;
use crate::ttl::RetentionPolicy;
use bson::oid::ObjectId;
use chrono::TimeDelta;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

pub const DEFAULT_RECENT_HOURS: i64 = 24;
pub const DEFAULT_DAILY_DAYS: i64 = 7;
pub const DEFAULT_UNPROCESSED_LIMIT: i64 = 100;

/// Events are inserted in batches of this size when generating test data
const GENERATE_CHUNK: usize = 1000;

/// Event service over a repository, stamping retention at creation time
pub struct EventService<R: EventRepository> {
    repository: R,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl<R: EventRepository> EventService<R> {
    pub fn new(repository: R, policy: RetentionPolicy) -> Self {
        Self {
            repository,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Create and store a new event
    #[instrument(skip(self, create), fields(event_type = %create.event_type))]
    pub async fn create_event(&self, create: CreateEvent) -> Result<Event> {
        create.validate()?;

        let event = create.into_event(&self.policy, self.clock.now())?;
        let event = self.repository.create(event).await?;
        info!(id = ?event.id, expires_at = %event.expires_at, "Event stored");
        Ok(event)
    }

    /// Create multiple events, returning them as stored
    #[instrument(skip(self, creates), fields(count = creates.len()))]
    pub async fn create_events(&self, creates: Vec<CreateEvent>) -> Result<Vec<Event>> {
        for create in &creates {
            create.validate()?;
        }

        let now = self.clock.now();
        let events = creates
            .into_iter()
            .map(|create| create.into_event(&self.policy, now))
            .collect::<Result<Vec<_>>>()?;

        let ids = self.repository.bulk_create(events).await?;
        info!(count = ids.len(), "Events batch stored");
        self.repository.get_by_ids(ids).await
    }

    #[instrument(skip(self))]
    pub async fn get_event(&self, id: &str) -> Result<Event> {
        let oid = ObjectId::parse_str(id)?;
        self.repository
            .get_by_id(oid)
            .await?
            .ok_or_else(|| EventError::not_found("Event", id))
    }

    #[instrument(skip(self, filter, pagination))]
    pub async fn list_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<Vec<Event>> {
        if pagination.limit <= 0 {
            return Err(EventError::Validation(
                "limit must be greater than zero".to_string(),
            ));
        }
        let now = self.clock.now();
        filter.since(now)?;
        self.repository.list(filter, pagination, now).await
    }

    #[instrument(skip(self, filter))]
    pub async fn count_events(&self, filter: EventFilter) -> Result<u64> {
        let now = self.clock.now();
        filter.since(now)?;
        self.repository.count(filter, now).await
    }

    pub async fn event_types(&self) -> Result<Vec<String>> {
        self.repository.event_types().await
    }

    /// Events created in the last `hours` (default 24), newest first
    #[instrument(skip(self))]
    pub async fn recent_events(&self, hours: Option<i64>) -> Result<Vec<Event>> {
        let hours = positive("hours", hours, DEFAULT_RECENT_HOURS)?;
        let since = clock::before(self.clock.now(), TimeDelta::try_hours(hours), "hours")?;
        let events = self.repository.recent(since).await?;
        info!(count = events.len(), %since, "Fetched recent events");
        Ok(events)
    }

    pub async fn aggregate_by_type(&self) -> Result<Vec<TypeAggregate>> {
        self.repository.aggregate_by_type().await
    }

    /// Per-day totals for the last `days` (default 7), oldest day first
    #[instrument(skip(self))]
    pub async fn daily_statistics(&self, days: Option<i64>) -> Result<Vec<DailyStatistics>> {
        let days = positive("days", days, DEFAULT_DAILY_DAYS)?;
        let since = clock::before(self.clock.now(), TimeDelta::try_days(days), "days")?;
        self.repository.daily_statistics(since).await
    }

    #[instrument(skip(self))]
    pub async fn mark_processed(&self, id: &str) -> Result<Event> {
        let oid = ObjectId::parse_str(id)?;
        self.repository
            .mark_processed(oid, self.clock.now())
            .await?
            .ok_or_else(|| EventError::not_found("Event", id))
    }

    pub async fn unprocessed_events(&self, limit: Option<i64>) -> Result<Vec<Event>> {
        let limit = positive("limit", limit, DEFAULT_UNPROCESSED_LIMIT)?;
        self.repository.unprocessed(limit).await
    }

    /// Generate and store synthetic events
    #[instrument(
        skip(self, request),
        fields(count = request.count, criticals_only = request.criticals_only)
    )]
    pub async fn generate_test_data(
        &self,
        request: GenerateTestDataRequest,
    ) -> Result<GenerateTestDataResponse> {
        request.validate()?;

        let mut generator = if request.criticals_only {
            EventGenerator::criticals_only(request.seed)?
        } else {
            EventGenerator::new(request.seed)?
        };

        let now = self.clock.now();
        let mut created = 0;
        let mut remaining = request.count;
        while remaining > 0 {
            let chunk = remaining.min(GENERATE_CHUNK);
            let events = generator
                .generate(chunk, now)
                .into_iter()
                .map(|create| create.into_event(&self.policy, now))
                .collect::<Result<Vec<_>>>()?;

            created += self.repository.bulk_create(events).await?.len();
            remaining -= chunk;
        }

        info!(created, "Test data generated");
        Ok(GenerateTestDataResponse {
            requested: request.count,
            created,
            criticals_only: request.criticals_only,
        })
    }
}

fn positive(name: &str, value: Option<i64>, default: i64) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(v) if v > 0 => Ok(v),
        Some(v) => Err(EventError::Validation(format!(
            "{name} must be greater than zero, got {v}"
        ))),
    }
}
