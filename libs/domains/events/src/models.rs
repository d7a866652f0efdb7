//! Event domain models

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::clock;
use crate::crud::{Entity, SortOrder};
use crate::error::Result;
use crate::indexes::EVENTS_COLLECTION;
use crate::ttl::{RetentionPolicy, SeverityValue};

/// Stored event document.
///
/// All timestamps are BSON dates so the TTL index on `expires_at` applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Producer-assigned identifier
    pub event_id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub source: String,

    pub severity: i32,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Document>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,

    #[serde(default)]
    pub processed: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    /// Set once at creation from severity; never recomputed
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl Entity for Event {
    const COLLECTION: &'static str = EVENTS_COLLECTION;

    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

/// DTO for creating new events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEvent {
    /// Producer-assigned identifier; generated when absent
    #[serde(default)]
    pub event_id: Option<String>,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 255, message = "type must be 1-255 characters"))]
    pub event_type: String,

    #[validate(length(min = 1, max = 255, message = "source must be 1-255 characters"))]
    pub source: String,

    #[validate(range(min = 1, max = 10, message = "severity must be between 1 and 10"))]
    pub severity: i32,

    /// When the event occurred; defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub trace_id: Option<String>,

    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub payload: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl CreateEvent {
    /// Build the stored event. `expires_at` is derived here and nowhere else.
    pub fn into_event(self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<Event> {
        let expires_at = policy.expires_at(Some(&SeverityValue::from(self.severity)), now);

        Ok(Event {
            id: None,
            event_id: self
                .event_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            event_type: self.event_type,
            source: self.source,
            severity: self.severity,
            timestamp: self.timestamp.unwrap_or(now),
            user_id: self.user_id,
            session_id: self.session_id,
            trace_id: self.trace_id,
            payload: self.payload.map(to_document).transpose()?,
            metadata: self.metadata.map(to_document).transpose()?,
            processed: false,
            created_at: now,
            updated_at: now,
            expires_at,
        })
    }
}

fn to_document(map: serde_json::Map<String, serde_json::Value>) -> Result<Document> {
    Ok(bson::to_document(&map)?)
}

/// Event as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    /// Hex ObjectId
    pub id: String,
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub severity: i32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
            event_id: event.event_id,
            event_type: event.event_type,
            source: event.source,
            severity: event.severity,
            timestamp: event.timestamp,
            user_id: event.user_id,
            session_id: event.session_id,
            trace_id: event.trace_id,
            payload: event
                .payload
                .map(|d| Bson::Document(d).into_relaxed_extjson()),
            metadata: event
                .metadata
                .map(|d| Bson::Document(d).into_relaxed_extjson()),
            processed: event.processed,
            created_at: event.created_at,
            updated_at: event.updated_at,
            expires_at: event.expires_at,
        }
    }
}

/// Severity buckets accepted by the `priority` filter
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    /// Severity 3 and below
    Low,
    /// Severity 4 to 6
    Medium,
    /// Severity 7 and above
    High,
}

impl Priority {
    fn severity_condition(self) -> Document {
        match self {
            Self::Low => doc! { "$lte": 3 },
            Self::Medium => doc! { "$gte": 4, "$lte": 6 },
            Self::High => doc! { "$gte": 7 },
        }
    }
}

/// Query filters for listing and counting events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub event_types: Vec<String>,
    pub sources: Vec<String>,
    /// Only events created within the last N hours
    pub hours: Option<i64>,
    pub priority: Option<Priority>,
    /// `$text` search over the combined text index
    pub search: Option<String>,
}

impl EventFilter {
    /// Lower bound on `created_at` implied by `hours`.
    pub fn since(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        self.hours
            .map(|hours| clock::before(now, TimeDelta::try_hours(hours), "hours"))
            .transpose()
    }

    pub fn to_document(&self, now: DateTime<Utc>) -> Result<Document> {
        let mut filter = Document::new();

        match self.event_types.as_slice() {
            [] => {}
            [single] => {
                filter.insert("type", single.clone());
            }
            many => {
                filter.insert("type", doc! { "$in": many.to_vec() });
            }
        }

        match self.sources.as_slice() {
            [] => {}
            [single] => {
                filter.insert("source", single.clone());
            }
            many => {
                filter.insert("source", doc! { "$in": many.to_vec() });
            }
        }

        if let Some(since) = self.since(now)? {
            filter.insert("created_at", doc! { "$gte": bson::DateTime::from_chrono(since) });
        }

        if let Some(priority) = self.priority {
            filter.insert("severity", priority.severity_condition());
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.insert("$text", doc! { "$search": search });
        }

        Ok(filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: u64,
    pub sort_by: String,
    pub order: SortOrder,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            sort_by: "created_at".to_string(),
            order: SortOrder::Desc,
        }
    }
}

/// Query string for `GET /events` and `GET /events/count`
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    /// Comma-separated event types
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Comma-separated sources
    pub source: Option<String>,
    /// Created within the last N hours
    #[validate(range(min = 1, message = "hours must be positive"))]
    pub hours: Option<i64>,
    pub priority: Option<Priority>,
    /// Full-text search
    pub search: Option<String>,
    /// Field to sort by (default `created_at`)
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default `desc`)
    pub order: Option<SortOrder>,
    /// Page size (default 10)
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: Option<i64>,
    /// Items to skip (default 0)
    pub offset: Option<u64>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl EventQuery {
    pub fn filter(&self) -> EventFilter {
        EventFilter {
            event_types: split_list(self.event_type.as_deref()),
            sources: split_list(self.source.as_deref()),
            hours: self.hours,
            priority: self.priority,
            search: self.search.clone(),
        }
    }

    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
            sort_by: self
                .sort_by
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.sort_by),
            order: self.order.unwrap_or(defaults.order),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}

/// Event count and latest occurrence per type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TypeAggregate {
    #[serde(rename = "type")]
    pub event_type: String,
    pub count: i64,
    pub last_event: DateTime<Utc>,
}

/// Events created on one UTC day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyStatistics {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: i64,
    pub unique_types: usize,
    pub event_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenerateTestDataRequest {
    #[validate(range(min = 1, max = 10000, message = "count must be between 1 and 10000"))]
    pub count: usize,
    /// Only produce severities 8 to 10
    #[serde(default)]
    pub criticals_only: bool,
    /// Seed for reproducible output
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateTestDataResponse {
    pub requested: usize,
    pub created: usize,
    pub criticals_only: bool,
}
