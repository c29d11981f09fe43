//! Key-value/stream sink abstraction and an in-memory implementation.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use thiserror::Error;

use crate::config::store::TrimMode;

/// Failure talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection could not be established.
    #[error("Failed to connect to store: {0}")]
    Connection(#[source] redis::RedisError),

    /// The store rejected or failed a command.
    #[error("Store command failed: {0}")]
    Command(#[source] redis::RedisError),

    /// No reply within the configured bound.
    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Length cap applied on every stream append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTrim {
    /// Best-effort: the store may keep some entries beyond the cap.
    Approximate(usize),
    /// The stream never holds more than the cap after the write.
    Exact(usize),
}

impl StreamTrim {
    pub fn new(mode: TrimMode, max_len: usize) -> Self {
        match mode {
            TrimMode::Approximate => StreamTrim::Approximate(max_len),
            TrimMode::Exact => StreamTrim::Exact(max_len),
        }
    }

    pub fn max_len(&self) -> usize {
        match self {
            StreamTrim::Approximate(n) | StreamTrim::Exact(n) => *n,
        }
    }
}

/// Minimal set of store operations the publishers need.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Overwrites `key` with `value`, without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Appends one `field = value` entry to `stream`, then trims it.
    ///
    /// Returns the entry id assigned by the store.
    async fn append_trimmed(
        &self,
        stream: &str,
        field: &str,
        value: &str,
        trim: StreamTrim,
    ) -> Result<String, StoreError>;
}

/// One stream entry held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    keys: HashMap<String, String>,
    streams: HashMap<String, VecDeque<StreamEntry>>,
    sequence: u64,
}

/// Process-local store with the same overwrite and trimming semantics as the
/// Redis commands used in production. Approximate trimming is treated as
/// exact.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().keys.get(key).cloned()
    }

    /// Entries of `stream`, oldest first.
    pub fn entries(&self, stream: &str) -> Vec<StreamEntry> {
        self.lock()
            .streams
            .get(stream)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the data from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().keys.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn append_trimmed(
        &self,
        stream: &str,
        field: &str,
        value: &str,
        trim: StreamTrim,
    ) -> Result<String, StoreError> {
        let mut state = self.lock();
        state.sequence += 1;
        let id = format!("{}-0", state.sequence);

        let entries = state.streams.entry(stream.to_string()).or_default();
        entries.push_back(StreamEntry {
            id: id.clone(),
            field: field.to_string(),
            value: value.to_string(),
        });
        while entries.len() > trim.max_len() {
            entries.pop_front();
        }

        Ok(id)
    }
}
