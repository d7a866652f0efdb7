//! Storage seams used by the index manager

use async_trait::async_trait;
use bson::{Bson, Document};

use super::catalog::IndexDescriptor;
use super::stats::IndexCreationRecord;
use crate::error::Result;

/// An index as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingIndex {
    pub name: String,
    pub keys: Document,
}

impl ExistingIndex {
    pub fn new(name: impl Into<String>, keys: Document) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }

    /// Text indexes are reported with `"text"` as a key direction.
    pub fn is_text(&self) -> bool {
        self.keys
            .values()
            .any(|v| matches!(v, Bson::String(s) if s == "text"))
    }
}

/// Index administration on a collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Indexes currently on `collection`; empty when the collection does not exist yet.
    async fn index_information(&self, collection: &str) -> Result<Vec<ExistingIndex>>;

    /// Create `descriptor` on `collection` under `name`, building in the background.
    async fn create_index(
        &self,
        collection: &str,
        descriptor: &IndexDescriptor,
        name: &str,
    ) -> Result<()>;

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()>;
}

/// Append-only log of index creation attempts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexAuditLog: Send + Sync {
    async fn insert(&self, record: &IndexCreationRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_existing_index_detects_text_keys() {
        let text = ExistingIndex::new("search", doc! { "_fts": "text", "_ftsx": 1 });
        let plain = ExistingIndex::new("type_1", doc! { "type": 1 });
        assert!(text.is_text());
        assert!(!plain.is_text());
    }
}
