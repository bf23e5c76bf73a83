//! Key-value store abstraction and the in-memory backend.

use crate::error::KvError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// String key-value store with native per-key expiration.
///
/// Entries whose expiration has passed are never returned by `get` or
/// `list_keys`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// List every live key.
    async fn list_keys(&self) -> Result<Vec<String>, KvError>;

    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a value, optionally dropping it automatically at `expiration`.
    async fn put(
        &self,
        key: &str,
        value: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<(), KvError>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

/// Entry in the memory store with expiration tracking.
struct KvEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl KvEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process key-value store emulating native TTL.
///
/// Expired entries are hidden from reads and purged whenever keys are
/// listed. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<String, KvEntry>>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        info!("In-memory key-value store initialized");
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Expiration recorded for a live key.
    pub async fn expiration(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before_count = entries.len();

        entries.retain(|_, entry| entry.is_live(now));

        let removed = before_count - entries.len();
        if removed > 0 {
            debug!("Purged {} expired entries", removed);
        }
        removed
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn list_keys(&self) -> Result<Vec<String>, KvError> {
        self.purge_expired().await;

        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Utc::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    #[instrument(skip(self, value))]
    async fn put(
        &self,
        key: &str,
        value: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<(), KvError> {
        self.entries.write().await.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at: expiration,
            },
        );
        debug!("Stored value");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), KvError> {
        if self.entries.write().await.remove(key).is_some() {
            debug!("Deleted value");
        }
        Ok(())
    }
}
