//! Per-run index creation statistics and audit records.

use bson::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::{error, info};

use super::catalog::IndexDescriptor;
use super::store::IndexAuditLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IndexStatus {
    Created,
    Skipped,
    Error,
}

/// One document in the `index_metrics` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCreationRecord {
    pub collection_name: String,
    pub index_name: String,
    pub status: IndexStatus,
    /// Seconds spent handling the descriptor
    pub duration: f64,
    pub keys: Document,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Serializable outcome of one collection's index run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStatsSummary {
    pub collection: String,
    pub created_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    /// Audit records that could not be written
    pub audit_failures: usize,
}

/// Accumulates outcomes for one collection and writes audit records for
/// created and failed indexes. Skips are counted only.
pub struct IndexCreationStats<'a, A: IndexAuditLog + ?Sized> {
    collection: String,
    audit: &'a A,
    summary: IndexStatsSummary,
}

impl<'a, A: IndexAuditLog + ?Sized> IndexCreationStats<'a, A> {
    pub fn new(collection: impl Into<String>, audit: &'a A) -> Self {
        let collection = collection.into();
        Self {
            summary: IndexStatsSummary {
                collection: collection.clone(),
                ..IndexStatsSummary::default()
            },
            collection,
            audit,
        }
    }

    pub async fn handle_status(
        &mut self,
        status: IndexStatus,
        index_name: &str,
        duration: Duration,
        descriptor: &IndexDescriptor,
        error: Option<String>,
    ) {
        match status {
            IndexStatus::Created => {
                self.summary.created_count += 1;
                self.summary.created.push(index_name.to_string());
                info!(
                    collection = %self.collection,
                    index = %index_name,
                    duration_ms = duration.as_millis() as u64,
                    "Index created"
                );
            }
            IndexStatus::Skipped => {
                self.summary.skipped_count += 1;
                self.summary.skipped.push(index_name.to_string());
                info!(collection = %self.collection, index = %index_name, "Index already exists");
                return;
            }
            IndexStatus::Error => {
                self.summary.failed_count += 1;
                self.summary.failed.push(index_name.to_string());
                error!(
                    collection = %self.collection,
                    index = %index_name,
                    error = error.as_deref().unwrap_or("unknown"),
                    "Index creation failed"
                );
            }
        }

        let record = IndexCreationRecord {
            collection_name: self.collection.clone(),
            index_name: index_name.to_string(),
            status,
            duration: duration.as_secs_f64(),
            keys: descriptor.keys_document(),
            created_at: Utc::now(),
            error,
        };

        if let Err(e) = self.audit.insert(&record).await {
            self.summary.audit_failures += 1;
            error!(
                collection = %self.collection,
                index = %index_name,
                error = %e,
                "Failed to write index audit record"
            );
        }
    }

    pub fn summary(&self) -> &IndexStatsSummary {
        &self.summary
    }

    pub fn into_summary(self) -> IndexStatsSummary {
        self.summary
    }
}
