//! Declarative index catalog.

use bson::{Bson, Document};
use std::time::Duration;

pub const EVENTS_COLLECTION: &str = "events";
pub const INDEX_METRICS_COLLECTION: &str = "index_metrics";

/// Direction of one key in an index specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    Ascending,
    Descending,
    Text,
}

impl IndexDirection {
    pub fn to_bson(self) -> Bson {
        match self {
            Self::Ascending => Bson::Int32(1),
            Self::Descending => Bson::Int32(-1),
            Self::Text => Bson::String("text".to_string()),
        }
    }

    fn name_part(self, field: &str) -> String {
        match self {
            Self::Ascending => field.to_string(),
            Self::Descending => format!("{field}_desc"),
            Self::Text => format!("{field}_text"),
        }
    }
}

/// One index the application expects to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub keys: Vec<(String, IndexDirection)>,
    pub name: Option<String>,
    pub unique: bool,
    pub expire_after: Option<Duration>,
    pub text: bool,
    pub default_language: Option<String>,
}

impl IndexDescriptor {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = (S, IndexDirection)>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(|(f, d)| (f.into(), d)).collect(),
            name: None,
            unique: false,
            expire_after: None,
            text: false,
            default_language: None,
        }
    }

    /// Text index over `fields`.
    pub fn text<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut descriptor = Self::new(fields.into_iter().map(|f| (f, IndexDirection::Text)));
        descriptor.text = true;
        descriptor
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn expire_after(mut self, ttl: Duration) -> Self {
        self.expire_after = Some(ttl);
        self
    }

    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    pub fn is_text(&self) -> bool {
        self.text || self.keys.iter().any(|(_, d)| *d == IndexDirection::Text)
    }

    /// Explicit name, or `idx_<collection>_<parts>` where each part is the
    /// field name with a `_desc` or `_text` suffix for non-ascending keys.
    pub fn canonical_name(&self, collection: &str) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|(field, direction)| direction.name_part(field))
            .collect();
        format!("idx_{}_{}", collection, parts.join("_"))
    }

    /// Ordered key specification as sent to the server
    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, direction)| (field.clone(), direction.to_bson()))
            .collect()
    }
}

/// Collections and their indexes, realised in listed order.
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    entries: Vec<(String, Vec<IndexDescriptor>)>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        mut self,
        collection: impl Into<String>,
        descriptors: Vec<IndexDescriptor>,
    ) -> Self {
        self.entries.push((collection.into(), descriptors));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[IndexDescriptor])> {
        self.entries
            .iter()
            .map(|(collection, descriptors)| (collection.as_str(), descriptors.as_slice()))
    }

    pub fn descriptors(&self, collection: &str) -> Option<&[IndexDescriptor]> {
        self.iter()
            .find(|(name, _)| *name == collection)
            .map(|(_, descriptors)| descriptors)
    }

    /// Indexes for the events collection and the index audit collection.
    pub fn standard() -> Self {
        use IndexDirection::{Ascending as Asc, Descending as Desc};

        Self::new()
            .with_collection(
                EVENTS_COLLECTION,
                vec![
                    IndexDescriptor::new([("type", Asc), ("timestamp", Desc), ("severity", Desc)]),
                    IndexDescriptor::new([("user_id", Asc), ("timestamp", Desc)]),
                    IndexDescriptor::new([("trace_id", Asc)]),
                    IndexDescriptor::new([("source", Asc), ("timestamp", Desc)]),
                    IndexDescriptor::new([("expires_at", Asc)]).expire_after(Duration::ZERO),
                    IndexDescriptor::new([("session_id", Asc), ("timestamp", Desc)]),
                    IndexDescriptor::new([("severity", Desc), ("timestamp", Desc)]),
                    IndexDescriptor::text([
                        "payload.card_brand",
                        "payload.processor",
                        "payload.payment_method",
                        "payload.currency",
                        "payload.transaction_id",
                        "user_id",
                        "session_id",
                        "trace_id",
                    ])
                    .named("idx_events_combined_text")
                    .default_language("english"),
                ],
            )
            .with_collection(
                INDEX_METRICS_COLLECTION,
                vec![
                    IndexDescriptor::new([("collection_name", Asc), ("created_at", Desc)]),
                    IndexDescriptor::new([("status", Asc), ("created_at", Desc)]),
                ],
            )
    }
}
