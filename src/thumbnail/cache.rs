//! Thumbnail metadata cache.
//!
//! The key-value store remembers which thumbnails were generated (and how
//! large they are) and the dimensions of every source seen so far. Image bytes
//! never go through it; they live in the object storage.
//!
//! # Records
//!
//! ```text
//! thumbnail:{cache key}   -> ThumbnailRecord (JSON)
//! source:{source key}     -> SourceRecord (JSON)
//! ```
//!
//! Store failures are logged and treated as misses: a broken cache slows
//! requests down but never fails them.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::IoError;
use crate::io::{ObjectMetadata, ObjectStore, SourceRef};

use super::key::{source_key, CacheKey};

/// Default maximum number of entries in the in-memory store.
pub const DEFAULT_KV_CAPACITY: usize = 10_000;

// =============================================================================
// Key-Value Store
// =============================================================================

/// Metadata store shared by every service instance.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, IoError>;

    async fn set(&self, key: &str, value: String) -> Result<(), IoError>;
}

/// In-process LRU key-value store.
///
/// Suitable for a single process; entries beyond the capacity are evicted in
/// least-recently-used order.
pub struct MemoryKvStore {
    entries: RwLock<LruCache<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_KV_CAPACITY)
    }

    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IoError> {
        let mut entries = self.entries.write().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), IoError> {
        let mut entries = self.entries.write().await;
        entries.put(key.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// Records
// =============================================================================

/// A generated thumbnail known to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRecord {
    pub key: String,

    /// Storage name
    pub name: String,

    /// Public URL
    pub url: String,

    /// Pixel dimensions, when known
    pub size: Option<(u32, u32)>,

    /// Whether the object is known to be in storage
    pub exists: bool,
}

/// Dimensions of a source image, recorded the first time it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source: SourceRef,
    pub size: (u32, u32),
}

// =============================================================================
// Thumbnail Cache
// =============================================================================

/// Cache lookups and storage checks for thumbnails.
#[derive(Clone)]
pub struct ThumbnailCache {
    kv: Arc<dyn KeyValueStore>,
    storage: Arc<dyn ObjectStore>,
}

impl ThumbnailCache {
    pub fn new(kv: Arc<dyn KeyValueStore>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { kv, storage }
    }

    /// Look up a previously recorded thumbnail.
    pub async fn lookup(&self, key: &CacheKey) -> Option<ThumbnailRecord> {
        self.get_json(&thumbnail_entry(&key.key)).await
    }

    /// Record a thumbnail.
    pub async fn store(&self, record: &ThumbnailRecord) {
        self.set_json(&thumbnail_entry(&record.key), record).await;
    }

    /// Whether the thumbnail's object is already in storage.
    pub async fn exists_in_storage(&self, key: &CacheKey) -> Result<bool, IoError> {
        self.storage.exists(&key.name).await
    }

    /// Write encoded thumbnail bytes to storage.
    pub async fn write(
        &self,
        key: &CacheKey,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), IoError> {
        self.storage.write(&key.name, data, metadata).await
    }

    /// Public URL for a thumbnail.
    pub fn url(&self, key: &CacheKey) -> String {
        self.storage.url(&key.name)
    }

    /// Recorded dimensions of a source, if any.
    pub async fn source(&self, source: &SourceRef) -> Option<SourceRecord> {
        self.get_json(&source_entry(source)).await
    }

    /// Record a source's dimensions unless already known.
    ///
    /// Returns the record now in the store.
    pub async fn register_source(&self, source: &SourceRef, size: (u32, u32)) -> SourceRecord {
        if let Some(existing) = self.source(source).await {
            return existing;
        }
        let record = SourceRecord {
            source: source.clone(),
            size,
        };
        self.set_json(&source_entry(source), &record).await;
        record
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, entry: &str) -> Option<T> {
        match self.kv.get(entry).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(entry = entry, error = %e, "Discarding unreadable cache record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(entry = entry, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    async fn set_json<T: Serialize>(&self, entry: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(entry = entry, error = %e, "Failed to serialize cache record");
                return;
            }
        };
        match self.kv.set(entry, raw).await {
            Ok(()) => debug!(entry = entry, "Cache record written"),
            Err(e) => warn!(entry = entry, error = %e, "Cache write failed"),
        }
    }
}

fn thumbnail_entry(key: &str) -> String {
    format!("thumbnail:{}", key)
}

fn source_entry(source: &SourceRef) -> String {
    format!("source:{}", source_key(source))
}

// =============================================================================
// Tests
// =============================================================================
