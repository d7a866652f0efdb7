//! MongoDB implementations of the index seams

use async_trait::async_trait;
use bson::Document;
use futures_util::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use tracing::instrument;

use super::catalog::{INDEX_METRICS_COLLECTION, IndexDescriptor};
use super::stats::IndexCreationRecord;
use super::store::{ExistingIndex, IndexAuditLog, IndexStore};
use crate::error::Result;

/// Server code for operations on a collection that does not exist
const NAMESPACE_NOT_FOUND: i32 = 26;

#[derive(Clone)]
pub struct MongoIndexStore {
    db: Database,
}

impl MongoIndexStore {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

/// Listing indexes on a collection that does not exist yet.
fn is_namespace_missing(err: &mongodb::error::Error) -> bool {
    matches!(*err.kind, ErrorKind::Command(ref c) if c.code == NAMESPACE_NOT_FOUND)
}

fn index_model(descriptor: &IndexDescriptor, name: &str) -> IndexModel {
    let mut options = IndexOptions::default();
    options.name = Some(name.to_string());
    options.background = Some(true);
    if descriptor.unique {
        options.unique = Some(true);
    }
    options.expire_after = descriptor.expire_after;
    options.default_language = descriptor.default_language.clone();

    IndexModel::builder()
        .keys(descriptor.keys_document())
        .options(options)
        .build()
}

#[async_trait]
impl IndexStore for MongoIndexStore {
    #[instrument(skip(self))]
    async fn index_information(&self, collection: &str) -> Result<Vec<ExistingIndex>> {
        let cursor = match self.collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(e) if is_namespace_missing(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let models: Vec<IndexModel> = cursor.try_collect().await?;
        Ok(models
            .into_iter()
            .filter_map(|model| {
                let name = model.options.and_then(|o| o.name)?;
                Some(ExistingIndex::new(name, model.keys))
            })
            .collect())
    }

    #[instrument(skip(self, descriptor))]
    async fn create_index(
        &self,
        collection: &str,
        descriptor: &IndexDescriptor,
        name: &str,
    ) -> Result<()> {
        self.collection(collection)
            .create_index(index_model(descriptor, name))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        self.collection(collection).drop_index(name).await?;
        Ok(())
    }
}

/// Writes audit records to the `index_metrics` collection
#[derive(Clone)]
pub struct MongoIndexAuditLog {
    collection: Collection<IndexCreationRecord>,
}

impl MongoIndexAuditLog {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(INDEX_METRICS_COLLECTION),
        }
    }
}

#[async_trait]
impl IndexAuditLog for MongoIndexAuditLog {
    async fn insert(&self, record: &IndexCreationRecord) -> Result<()> {
        self.collection.insert_one(record).await?;
        Ok(())
    }
}
