//! Access to the server's query profiler

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures_util::TryStreamExt;
use mongodb::Database;
use mongodb::options::FindOptions;
use tracing::instrument;

use super::models::ProfilerSnapshot;
use crate::error::{EventError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfilerBackend: Send + Sync + 'static {
    /// Set the profiling level, optionally with a slow-operation threshold.
    async fn set_level(&self, level: i32, slowms: Option<i64>) -> Result<()>;

    /// Read the current profiler configuration without changing it.
    async fn status(&self) -> Result<ProfilerSnapshot>;

    /// Latest `system.profile` entries, newest first.
    async fn recent_entries(&self, limit: i64) -> Result<Vec<Document>>;
}

#[derive(Clone)]
pub struct MongoProfilerBackend {
    db: Database,
}

impl MongoProfilerBackend {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

fn read_i64(doc: &Document, key: &str) -> Option<i64> {
    match doc.get(key)? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}

/// Parse the reply of `{ profile: -1 }`.
fn parse_status(reply: &Document) -> Result<ProfilerSnapshot> {
    let level = read_i64(reply, "was")
        .ok_or_else(|| EventError::Internal("profile reply without 'was'".to_string()))?;

    Ok(ProfilerSnapshot {
        level: level as i32,
        slowms: read_i64(reply, "slowms").unwrap_or_default(),
        sample_rate: reply.get_f64("sampleRate").ok(),
        stop_time: None,
    })
}

#[async_trait]
impl ProfilerBackend for MongoProfilerBackend {
    #[instrument(skip(self))]
    async fn set_level(&self, level: i32, slowms: Option<i64>) -> Result<()> {
        let mut command = doc! { "profile": level };
        if let Some(slowms) = slowms {
            command.insert("slowms", slowms);
        }
        self.db.run_command(command).await?;
        Ok(())
    }

    async fn status(&self) -> Result<ProfilerSnapshot> {
        let reply = self.db.run_command(doc! { "profile": -1 }).await?;
        parse_status(&reply)
    }

    #[instrument(skip(self))]
    async fn recent_entries(&self, limit: i64) -> Result<Vec<Document>> {
        let mut options = FindOptions::default();
        options.sort = Some(doc! { "ts": -1 });
        options.limit = Some(limit);

        let cursor = self
            .db
            .collection::<Document>("system.profile")
            .find(doc! {})
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_reply() {
        let reply = doc! { "was": 1, "slowms": 100, "sampleRate": 1.0, "ok": 1.0 };
        let snapshot = parse_status(&reply).unwrap();
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.slowms, 100);
        assert_eq!(snapshot.sample_rate, Some(1.0));
        assert_eq!(snapshot.stop_time, None);
    }

    #[test]
    fn test_parse_status_requires_level() {
        assert!(parse_status(&doc! { "ok": 1.0 }).is_err());
    }
}
