//! Generic single-collection CRUD over MongoDB

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use futures_util::TryStreamExt;
use mongodb::options::{CountOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::instrument;
use utoipa::ToSchema;

use crate::error::{EventError, Result};

/// A document type stored in its own collection
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Option<ObjectId>;
    fn set_id(&mut self, id: ObjectId);
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// Filter, sort and window for [`CrudRepository::get_all`].
///
/// Sorting applies before pagination; pagination skips then limits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Vec<(String, SortOrder)>,
    pub offset: Option<u64>,
    pub limit: Option<i64>,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    pub fn paginate(mut self, offset: u64, limit: i64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn sort_document(&self) -> Option<Document> {
        if self.sort.is_empty() {
            return None;
        }
        Some(
            self.sort
                .iter()
                .map(|(field, order)| (field.clone(), Bson::Int32(order.as_i32())))
                .collect(),
        )
    }

    fn options(&self) -> FindOptions {
        let mut options = FindOptions::default();
        options.sort = self.sort_document();
        options.skip = self.offset.filter(|o| *o > 0);
        options.limit = self.limit;
        options
    }
}

#[async_trait]
pub trait CrudRepository<T: Entity>: Send + Sync {
    /// Insert `entity` and return it with its assigned id.
    async fn create(&self, entity: T) -> Result<T>;

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<T>>;

    async fn get_all(&self, query: FindQuery) -> Result<Vec<T>>;

    /// `$set` the given fields and return the updated entity.
    async fn update(&self, id: ObjectId, fields: Document) -> Result<Option<T>>;

    async fn delete(&self, id: ObjectId) -> Result<bool>;

    async fn count(&self, filter: Document) -> Result<u64>;

    async fn exists(&self, id: ObjectId) -> Result<bool>;

    /// Insert all entities; ids are returned in input order.
    async fn bulk_create(&self, entities: Vec<T>) -> Result<Vec<ObjectId>>;
}

pub struct MongoCrud<T: Entity> {
    collection: Collection<T>,
}

impl<T: Entity> Clone for MongoCrud<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
        }
    }
}

impl<T: Entity> MongoCrud<T> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(T::COLLECTION),
        }
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }
}

fn inserted_object_id(id: &Bson) -> Result<ObjectId> {
    id.as_object_id()
        .ok_or_else(|| EventError::Internal(format!("unexpected inserted id: {id}")))
}

#[async_trait]
impl<T: Entity> CrudRepository<T> for MongoCrud<T> {
    #[instrument(skip(self, entity), fields(collection = T::COLLECTION))]
    async fn create(&self, mut entity: T) -> Result<T> {
        let result = self.collection.insert_one(&entity).await?;
        entity.set_id(inserted_object_id(&result.inserted_id)?);
        Ok(entity)
    }

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<T>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    #[instrument(skip(self, query), fields(collection = T::COLLECTION))]
    async fn get_all(&self, query: FindQuery) -> Result<Vec<T>> {
        let options = query.options();
        let cursor = self
            .collection
            .find(query.filter)
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    #[instrument(skip(self, fields), fields(collection = T::COLLECTION))]
    async fn update(&self, id: ObjectId, fields: Document) -> Result<Option<T>> {
        let mut options = FindOneAndUpdateOptions::default();
        options.return_document = Some(ReturnDocument::After);

        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields })
            .with_options(options)
            .await?)
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete(&self, id: ObjectId) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, filter: Document) -> Result<u64> {
        Ok(self.collection.count_documents(filter).await?)
    }

    async fn exists(&self, id: ObjectId) -> Result<bool> {
        let mut options = CountOptions::default();
        options.limit = Some(1);

        let count = self
            .collection
            .count_documents(doc! { "_id": id })
            .with_options(options)
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self, entities), fields(collection = T::COLLECTION, count = entities.len()))]
    async fn bulk_create(&self, entities: Vec<T>) -> Result<Vec<ObjectId>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let result = self.collection.insert_many(&entities).await?;
        let mut ids: Vec<(usize, &Bson)> = result
            .inserted_ids
            .iter()
            .map(|(i, id)| (*i, id))
            .collect();
        ids.sort_by_key(|(index, _)| *index);
        ids.into_iter()
            .map(|(_, id)| inserted_object_id(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_document_keeps_order() {
        let query = FindQuery::new(doc! { "processed": false })
            .sort_by("severity", SortOrder::Desc)
            .sort_by("created_at", SortOrder::Asc);

        assert_eq!(
            query.sort_document(),
            Some(doc! { "severity": -1, "created_at": 1 })
        );
        let keys: Vec<_> = query.sort_document().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["severity", "created_at"]);
    }

    #[test]
    fn test_options_skip_then_limit() {
        let options = FindQuery::default().paginate(20, 10).options();
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.sort, None);

        let first_page = FindQuery::default().paginate(0, 10).options();
        assert_eq!(first_page.skip, None);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::Desc.to_string(), "desc");
        assert_eq!(SortOrder::Desc.as_i32(), -1);
    }

    #[test]
    fn test_inserted_id_must_be_object_id() {
        let id = ObjectId::new();
        assert_eq!(inserted_object_id(&Bson::ObjectId(id)).unwrap(), id);
        assert!(inserted_object_id(&Bson::Int32(1)).is_err());
    }
}
