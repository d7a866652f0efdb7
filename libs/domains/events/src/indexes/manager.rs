//! Reconciles the index catalog against live collections.

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use super::catalog::{IndexCatalog, IndexDescriptor};
use super::stats::{IndexCreationStats, IndexStatsSummary, IndexStatus};
use super::store::{ExistingIndex, IndexAuditLog, IndexStore};
use crate::error::Result;

pub struct IndexManager<S: IndexStore, A: IndexAuditLog> {
    store: S,
    audit: A,
    catalog: IndexCatalog,
}

impl<S: IndexStore, A: IndexAuditLog> IndexManager<S, A> {
    pub fn new(store: S, audit: A) -> Self {
        Self::with_catalog(store, audit, IndexCatalog::standard())
    }

    pub fn with_catalog(store: S, audit: A, catalog: IndexCatalog) -> Self {
        Self {
            store,
            audit,
            catalog,
        }
    }

    /// Startup entry point. Never fails: collections whose indexes cannot be
    /// listed are logged and left out, and the caller carries on.
    pub async fn init_indexes(&self) -> BTreeMap<String, IndexStatsSummary> {
        let results = self.initialize_all_indexes().await;
        for summary in results.values() {
            info!(
                collection = %summary.collection,
                created = summary.created_count,
                skipped = summary.skipped_count,
                failed = summary.failed_count,
                audit_failures = summary.audit_failures,
                "Index initialization finished"
            );
        }
        if results.is_empty() {
            warn!("No collection could be indexed, continuing without indexes");
        }
        results
    }

    /// Run every catalog entry in order. A collection that cannot be read is
    /// logged and omitted; the remaining collections still run.
    pub async fn initialize_all_indexes(&self) -> BTreeMap<String, IndexStatsSummary> {
        let mut results = BTreeMap::new();
        for (collection, descriptors) in self.catalog.iter() {
            match self
                .create_indexes_for_collection(collection, descriptors)
                .await
            {
                Ok(summary) => {
                    results.insert(collection.to_string(), summary);
                }
                Err(e) => {
                    error!(
                        collection,
                        error = %e,
                        "Could not read existing indexes, skipping collection"
                    );
                }
            }
        }
        results
    }

    /// Create missing indexes on one collection.
    ///
    /// Fails only when the existing indexes cannot be listed. Errors creating
    /// an individual index are recorded and the remaining descriptors still run.
    #[instrument(skip(self, descriptors), fields(descriptors = descriptors.len()))]
    pub async fn create_indexes_for_collection(
        &self,
        collection: &str,
        descriptors: &[IndexDescriptor],
    ) -> Result<IndexStatsSummary> {
        let mut existing = self.store.index_information(collection).await?;
        let mut stats = IndexCreationStats::new(collection, &self.audit);

        for descriptor in descriptors {
            let started = Instant::now();

            if descriptor.keys.is_empty() {
                warn!(
                    collection,
                    name = ?descriptor.name,
                    "Index descriptor has no keys, skipping"
                );
                continue;
            }

            let name = descriptor.canonical_name(collection);

            if existing.iter().any(|index| index.name == name) {
                stats
                    .handle_status(
                        IndexStatus::Skipped,
                        &name,
                        started.elapsed(),
                        descriptor,
                        None,
                    )
                    .await;
                continue;
            }

            match self
                .realize(collection, descriptor, &name, &mut existing)
                .await
            {
                Ok(()) => {
                    // Later descriptors see this index as existing.
                    existing.push(ExistingIndex::new(&name, descriptor.keys_document()));
                    stats
                        .handle_status(
                            IndexStatus::Created,
                            &name,
                            started.elapsed(),
                            descriptor,
                            None,
                        )
                        .await;
                }
                Err(e) => {
                    stats
                        .handle_status(
                            IndexStatus::Error,
                            &name,
                            started.elapsed(),
                            descriptor,
                            Some(e.to_string()),
                        )
                        .await;
                }
            }
        }

        Ok(stats.into_summary())
    }

    /// Drop conflicting text indexes when needed, then create.
    async fn realize(
        &self,
        collection: &str,
        descriptor: &IndexDescriptor,
        name: &str,
        existing: &mut Vec<ExistingIndex>,
    ) -> Result<()> {
        if descriptor.is_text() {
            // The server allows a single text index per collection.
            let stale: Vec<String> = existing
                .iter()
                .filter(|index| index.is_text())
                .map(|index| index.name.clone())
                .collect();

            for old in stale {
                info!(
                    collection,
                    index = %old,
                    replacement = %name,
                    "Dropping existing text index"
                );
                self.store.drop_index(collection, &old).await?;
                existing.retain(|index| index.name != old);
            }
        }

        self.store.create_index(collection, descriptor, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::indexes::catalog::{EVENTS_COLLECTION, INDEX_METRICS_COLLECTION, IndexDirection};
    use crate::indexes::stats::IndexCreationRecord;
    use async_trait::async_trait;
    use bson::doc;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    use IndexDirection::{Ascending as Asc, Descending as Desc};

    /// In-memory server: collections map to their indexes in creation order.
    #[derive(Default, Clone)]
    struct FakeIndexStore {
        collections: Arc<Mutex<HashMap<String, Vec<ExistingIndex>>>>,
        fail_on: Arc<Mutex<Option<String>>>,
        /// Collections whose index listing fails
        unreachable: Vec<&'static str>,
    }

    impl FakeIndexStore {
        fn seed(&self, collection: &str, index: ExistingIndex) {
            self.collections
                .lock()
                .entry(collection.to_string())
                .or_default()
                .push(index);
        }

        fn fail_creating(&self, name: &str) {
            *self.fail_on.lock() = Some(name.to_string());
        }

        fn indexes(&self, collection: &str) -> Vec<ExistingIndex> {
            self.collections
                .lock()
                .get(collection)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl IndexStore for FakeIndexStore {
        async fn index_information(&self, collection: &str) -> Result<Vec<ExistingIndex>> {
            if self.unreachable.contains(&collection) {
                return Err(EventError::Internal("server selection timeout".into()));
            }
            Ok(self.indexes(collection))
        }

        async fn create_index(
            &self,
            collection: &str,
            descriptor: &IndexDescriptor,
            name: &str,
        ) -> Result<()> {
            if self.fail_on.lock().as_deref() == Some(name) {
                return Err(EventError::Internal(format!("cannot create {name}")));
            }
            let mut collections = self.collections.lock();
            let indexes = collections.entry(collection.to_string()).or_default();
            if descriptor.is_text() && indexes.iter().any(ExistingIndex::is_text) {
                return Err(EventError::Internal("only one text index allowed".into()));
            }
            indexes.push(ExistingIndex::new(name, descriptor.keys_document()));
            Ok(())
        }

        async fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
            let mut collections = self.collections.lock();
            if let Some(indexes) = collections.get_mut(collection) {
                indexes.retain(|index| index.name != name);
            }
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct RecordingAuditLog {
        records: Arc<Mutex<Vec<IndexCreationRecord>>>,
    }

    #[async_trait]
    impl IndexAuditLog for RecordingAuditLog {
        async fn insert(&self, record: &IndexCreationRecord) -> Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }
    }

    fn manager(
        store: &FakeIndexStore,
        audit: &RecordingAuditLog,
    ) -> IndexManager<FakeIndexStore, RecordingAuditLog> {
        IndexManager::new(store.clone(), audit.clone())
    }

    #[tokio::test]
    async fn test_second_run_skips_everything_created_by_first() {
        let store = FakeIndexStore::default();
        let audit = RecordingAuditLog::default();
        let manager = manager(&store, &audit);

        let first = manager.initialize_all_indexes().await;
        let second = manager.initialize_all_indexes().await;

        for collection in [EVENTS_COLLECTION, INDEX_METRICS_COLLECTION] {
            let created = first[collection].created_count;
            assert!(created > 0);
            assert_eq!(first[collection].failed_count, 0);
            assert_eq!(second[collection].created_count, 0);
            assert_eq!(second[collection].skipped_count, created);
        }

        // Only the first run produced audit records.
        let created_total: usize = first.values().map(|s| s.created_count).sum();
        assert_eq!(audit.records.lock().len(), created_total);
    }

    #[tokio::test]
    async fn test_text_index_replaces_previous_text_index() {
        let store = FakeIndexStore::default();
        let audit = RecordingAuditLog::default();
        store.seed(
            EVENTS_COLLECTION,
            ExistingIndex::new("_id_", doc! { "_id": 1 }),
        );
        store.seed(
            EVENTS_COLLECTION,
            ExistingIndex::new("legacy_search", doc! { "_fts": "text", "_ftsx": 1 }),
        );

        let summary = manager(&store, &audit)
            .create_indexes_for_collection(
                EVENTS_COLLECTION,
                IndexCatalog::standard()
                    .descriptors(EVENTS_COLLECTION)
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(summary.failed_count, 0);
        let indexes = store.indexes(EVENTS_COLLECTION);
        let text: Vec<_> = indexes.iter().filter(|i| i.is_text()).collect();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].name, "idx_events_combined_text");
        assert!(indexes.iter().any(|i| i.name == "_id_"));
    }

    #[tokio::test]
    async fn test_existing_text_index_with_same_name_is_kept() {
        let store = FakeIndexStore::default();
        let audit = RecordingAuditLog::default();
        let descriptor = IndexDescriptor::text(["message"]).named("idx_events_search");
        store.seed(
            EVENTS_COLLECTION,
            ExistingIndex::new("idx_events_search", descriptor.keys_document()),
        );

        let summary = manager(&store, &audit)
            .create_indexes_for_collection(EVENTS_COLLECTION, &[descriptor])
            .await
            .unwrap();

        assert_eq!(summary.skipped, vec!["idx_events_search"]);
        assert_eq!(store.indexes(EVENTS_COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn test_single_failure_does_not_abort_batch() {
        let store = FakeIndexStore::default();
        let audit = RecordingAuditLog::default();
        store.seed(
            EVENTS_COLLECTION,
            ExistingIndex::new("idx_events_trace_id", doc! { "trace_id": 1 }),
        );
        store.fail_creating("idx_events_user_id_timestamp_desc");

        let descriptors = vec![
            IndexDescriptor::new([("type", Asc), ("timestamp", Desc)]),
            IndexDescriptor::new([("user_id", Asc), ("timestamp", Desc)]),
            IndexDescriptor::new([("trace_id", Asc)]),
            IndexDescriptor::new([("source", Asc), ("timestamp", Desc)]),
        ];

        let summary = manager(&store, &audit)
            .create_indexes_for_collection(EVENTS_COLLECTION, &descriptors)
            .await
            .unwrap();

        assert_eq!(summary.failed, vec!["idx_events_user_id_timestamp_desc"]);
        assert_eq!(
            summary.created,
            vec![
                "idx_events_type_timestamp_desc",
                "idx_events_source_timestamp_desc"
            ]
        );
        assert_eq!(summary.skipped, vec!["idx_events_trace_id"]);

        let records = audit.records.lock();
        assert_eq!(records.len(), 3);
        let failed: Vec<_> = records
            .iter()
            .filter(|r| r.status == IndexStatus::Error)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.as_deref().unwrap().contains("cannot create"));
    }

    #[tokio::test]
    async fn test_descriptor_without_keys_is_ignored() {
        let store = FakeIndexStore::default();
        let audit = RecordingAuditLog::default();
        let descriptors = vec![
            IndexDescriptor::new(Vec::<(String, IndexDirection)>::new()).named("empty"),
            IndexDescriptor::new([("trace_id", Asc)]),
        ];

        let summary = manager(&store, &audit)
            .create_indexes_for_collection(EVENTS_COLLECTION, &descriptors)
            .await
            .unwrap();

        assert_eq!(summary.created, vec!["idx_events_trace_id"]);
        assert_eq!(summary.skipped_count + summary.failed_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_in_one_run_is_skipped() {
        let store = FakeIndexStore::default();
        let audit = RecordingAuditLog::default();
        let descriptors = vec![
            IndexDescriptor::new([("trace_id", Asc)]),
            IndexDescriptor::new([("trace_id", Asc)]),
        ];

        let summary = manager(&store, &audit)
            .create_indexes_for_collection(EVENTS_COLLECTION, &descriptors)
            .await
            .unwrap();

        assert_eq!(summary.created_count, 1);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(store.indexes(EVENTS_COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_degrades_to_empty_result() {
        let store = FakeIndexStore {
            unreachable: vec![EVENTS_COLLECTION, INDEX_METRICS_COLLECTION],
            ..FakeIndexStore::default()
        };
        let audit = RecordingAuditLog::default();
        let manager = manager(&store, &audit);

        assert!(manager.initialize_all_indexes().await.is_empty());
        assert!(manager.init_indexes().await.is_empty());
        assert!(audit.records.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_collection_keeps_other_results() {
        let store = FakeIndexStore {
            unreachable: vec![INDEX_METRICS_COLLECTION],
            ..FakeIndexStore::default()
        };
        let audit = RecordingAuditLog::default();

        let results = manager(&store, &audit).init_indexes().await;

        assert_eq!(results.len(), 1);
        let events = &results[EVENTS_COLLECTION];
        assert_eq!(events.created_count, 8);
        assert_eq!(events.failed_count, 0);
        assert!(!results.contains_key(INDEX_METRICS_COLLECTION));
        assert_eq!(store.indexes(EVENTS_COLLECTION).len(), 8);
    }
}
