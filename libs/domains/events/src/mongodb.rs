//! MongoDB implementation of EventRepository

use crate::crud::{CrudRepository, FindQuery, MongoCrud, SortOrder};
use crate::error::Result;
use crate::models::{DailyStatistics, Event, EventFilter, Pagination, TypeAggregate};
use crate::repository::EventRepository;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::Database;
use serde::Deserialize;
use tracing::{debug, instrument};

/// MongoDB-based event repository
#[derive(Clone)]
pub struct MongoEventRepository {
    crud: MongoCrud<Event>,
}

#[derive(Debug, Deserialize)]
struct TypeRow {
    #[serde(rename = "_id")]
    event_type: String,
    count: i64,
    last_event: bson::DateTime,
}

impl From<TypeRow> for TypeAggregate {
    fn from(row: TypeRow) -> Self {
        Self {
            event_type: row.event_type,
            count: row.count,
            last_event: row.last_event.to_chrono(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "_id")]
    date: String,
    count: i64,
    types: Vec<String>,
}

impl From<DailyRow> for DailyStatistics {
    fn from(row: DailyRow) -> Self {
        let mut event_types = row.types;
        event_types.sort();
        Self {
            date: row.date,
            count: row.count,
            unique_types: event_types.len(),
            event_types,
        }
    }
}

fn by_type_pipeline() -> Vec<Document> {
    vec![
        doc! {
            "$group": {
                "_id": "$type",
                "count": { "$sum": 1 },
                "last_event": { "$max": "$created_at" },
            }
        },
        doc! { "$sort": { "count": -1, "_id": 1 } },
    ]
}

fn daily_pipeline(since: DateTime<Utc>) -> Vec<Document> {
    vec![
        doc! { "$match": { "created_at": { "$gte": bson::DateTime::from_chrono(since) } } },
        doc! {
            "$group": {
                "_id": { "$dateToString": { "format": "%Y-%m-%d", "date": "$created_at" } },
                "count": { "$sum": 1 },
                "types": { "$addToSet": "$type" },
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

impl MongoEventRepository {
    /// Create a new MongoDB event repository
    pub fn new(database: &Database) -> Self {
        Self {
            crud: MongoCrud::new(database),
        }
    }

    async fn aggregate<T>(&self, pipeline: Vec<Document>) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let cursor = self.crud.collection().aggregate(pipeline).await?;
        let rows: Vec<Document> = cursor.try_collect().await?;
        rows.into_iter()
            .map(|row| bson::from_document(row).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl EventRepository for MongoEventRepository {
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    async fn create(&self, event: Event) -> Result<Event> {
        self.crud.create(event).await
    }

    async fn bulk_create(&self, events: Vec<Event>) -> Result<Vec<ObjectId>> {
        self.crud.bulk_create(events).await
    }

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<Event>> {
        self.crud.get_by_id(id).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_by_ids(&self, ids: Vec<ObjectId>) -> Result<Vec<Event>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut found = self
            .crud
            .get_all(FindQuery::new(doc! { "_id": { "$in": ids.clone() } }))
            .await?;

        // keep the caller's order
        found.sort_by_key(|event| {
            event
                .id
                .and_then(|id| ids.iter().position(|wanted| *wanted == id))
                .unwrap_or(usize::MAX)
        });
        Ok(found)
    }

    #[instrument(skip(self, filter, pagination))]
    async fn list(
        &self,
        filter: EventFilter,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let query = FindQuery::new(filter.to_document(now)?)
            .sort_by(pagination.sort_by, pagination.order)
            .paginate(pagination.offset, pagination.limit);
        debug!(filter = %query.filter, "listing events");
        self.crud.get_all(query).await
    }

    #[instrument(skip(self, filter))]
    async fn count(&self, filter: EventFilter, now: DateTime<Utc>) -> Result<u64> {
        self.crud.count(filter.to_document(now)?).await
    }

    #[instrument(skip(self))]
    async fn event_types(&self) -> Result<Vec<String>> {
        let values = self.crud.collection().distinct("type", doc! {}).await?;
        let mut types: Vec<String> = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(s) => Some(s),
                _ => None,
            })
            .collect();
        types.sort();
        Ok(types)
    }

    #[instrument(skip(self))]
    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        let query = FindQuery::new(doc! {
            "created_at": { "$gte": bson::DateTime::from_chrono(since) }
        })
        .sort_by("created_at", SortOrder::Desc);
        self.crud.get_all(query).await
    }

    #[instrument(skip(self))]
    async fn aggregate_by_type(&self) -> Result<Vec<TypeAggregate>> {
        let rows: Vec<TypeRow> = self.aggregate(by_type_pipeline()).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn daily_statistics(&self, since: DateTime<Utc>) -> Result<Vec<DailyStatistics>> {
        let rows: Vec<DailyRow> = self.aggregate(daily_pipeline(since)).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn mark_processed(&self, id: ObjectId, at: DateTime<Utc>) -> Result<Option<Event>> {
        self.crud
            .update(
                id,
                doc! { "processed": true, "updated_at": bson::DateTime::from_chrono(at) },
            )
            .await
    }

    #[instrument(skip(self))]
    async fn unprocessed(&self, limit: i64) -> Result<Vec<Event>> {
        let query = FindQuery::new(doc! { "processed": { "$ne": true } })
            .sort_by("created_at", SortOrder::Asc)
            .paginate(0, limit);
        self.crud.get_all(query).await
    }
}
