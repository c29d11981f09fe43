//! Snapshot publishing.
//!
//! Two interchangeable strategies write the serialized snapshot to the store:
//!
//! * [`LatestValuePublisher`] overwrites one key, keeping only the newest
//!   snapshot.
//! * [`StreamPublisher`] appends to a stream capped at a maximum length, so
//!   readers get a bounded history ordered by entry id.
//!
//! The strategy is picked once at startup by [`build_publisher`]. Publishing
//! is fire-and-forget from the executor's point of view: failures are
//! reported, never queued or retried.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::{
    config::store::{PublishMode, PublisherConfig},
    core::extractor::MetricSnapshot,
};

pub mod redis_store;
pub mod store;

pub use self::{
    redis_store::RedisStore,
    store::{MemoryStore, SnapshotStore, StoreError, StreamEntry, StreamTrim},
};

/// Failure of one publish.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes one snapshot to its destination.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, snapshot: &MetricSnapshot) -> Result<(), PublishError>;

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

fn encode(snapshot: &MetricSnapshot, report_unresolved: bool) -> Result<String, PublishError> {
    let payload = serde_json::to_string(&snapshot.wire(report_unresolved))?;
    trace!("Encoded snapshot: {}", payload);
    Ok(payload)
}

/// Overwrites a single key with the newest snapshot (`SET`, no expiry).
pub struct LatestValuePublisher {
    store: Arc<dyn SnapshotStore>,
    key: String,
    report_unresolved: bool,
}

impl LatestValuePublisher {
    pub fn new(store: Arc<dyn SnapshotStore>, key: impl Into<String>, report_unresolved: bool) -> Self {
        Self {
            store,
            key: key.into(),
            report_unresolved,
        }
    }
}

#[async_trait::async_trait]
impl Publisher for LatestValuePublisher {
    async fn publish(&self, snapshot: &MetricSnapshot) -> Result<(), PublishError> {
        let payload = encode(snapshot, self.report_unresolved)?;
        self.store.set(&self.key, &payload).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("latest value at '{}'", self.key)
    }
}

/// Appends every snapshot to a length-capped stream.
pub struct StreamPublisher {
    store: Arc<dyn SnapshotStore>,
    stream: String,
    field: String,
    trim: StreamTrim,
    report_unresolved: bool,
}

impl StreamPublisher {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        stream: impl Into<String>,
        field: impl Into<String>,
        trim: StreamTrim,
        report_unresolved: bool,
    ) -> Self {
        Self {
            store,
            stream: stream.into(),
            field: field.into(),
            trim,
            report_unresolved,
        }
    }
}

#[async_trait::async_trait]
impl Publisher for StreamPublisher {
    async fn publish(&self, snapshot: &MetricSnapshot) -> Result<(), PublishError> {
        let payload = encode(snapshot, self.report_unresolved)?;
        let id = self
            .store
            .append_trimmed(&self.stream, &self.field, &payload, self.trim)
            .await?;
        trace!("Appended entry {} to stream '{}'", id, self.stream);
        Ok(())
    }

    fn describe(&self) -> String {
        let (kind, max_len) = match self.trim {
            StreamTrim::Approximate(n) => ("~", n),
            StreamTrim::Exact(n) => ("=", n),
        };
        format!("stream '{}' (MAXLEN {} {})", self.stream, kind, max_len)
    }
}

/// Selects the persistence strategy configured for this process.
pub fn build_publisher(
    store: Arc<dyn SnapshotStore>,
    config: &PublisherConfig,
    report_unresolved: bool,
) -> Arc<dyn Publisher> {
    match config.mode {
        PublishMode::Latest => Arc::new(LatestValuePublisher::new(
            store,
            config.key.clone(),
            report_unresolved,
        )),
        PublishMode::Stream => Arc::new(StreamPublisher::new(
            store,
            config.key.clone(),
            config.field.clone(),
            StreamTrim::new(config.trim, config.max_len),
            report_unresolved,
        )),
    }
}
