//! Index bootstrap: a static catalog reconciled against live collections at
//! startup, with per-run statistics and an audit trail in `index_metrics`.

mod catalog;
mod manager;
mod mongodb;
mod stats;
mod store;

pub use catalog::{
    EVENTS_COLLECTION, INDEX_METRICS_COLLECTION, IndexCatalog, IndexDescriptor, IndexDirection,
};
pub use manager::IndexManager;
pub use self::mongodb::{MongoIndexAuditLog, MongoIndexStore};
pub use stats::{IndexCreationRecord, IndexCreationStats, IndexStatsSummary, IndexStatus};
pub use store::{ExistingIndex, IndexAuditLog, IndexStore};
