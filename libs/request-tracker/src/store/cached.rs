//! Cache-aside decorator
//!
//! Fronts any authoritative [`RequestStore`] with a bounded, TTL-expiring
//! in-memory cache. Reads are read-through: a miss falls back to the
//! authority and populates the cache. Writes always go to the authority
//! first; the cache entry is only inserted or replaced after the authority
//! accepted the write.
//!
//! The cache is per-instance and purely an optimization: every correctness
//! property of the store (in particular the atomic create) is provided by
//! the authority, and holds identically with this layer removed.

use async_trait::async_trait;
use correlation_context::CorrelationId;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::TrackerResult;
use crate::model::TrackedRequest;
use crate::store::RequestStore;

/// Cache sizing and expiry knobs.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Entry time-to-live; sized to cover realistic retry windows, well
    /// below the authority's retention.
    pub ttl: Duration,
    /// Maximum cached entries.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 10_000,
        }
    }
}

pub struct CachedRequestStore<S> {
    authority: S,
    cache: Cache<Uuid, TrackedRequest>,
}

impl<S: RequestStore> CachedRequestStore<S> {
    pub fn new(authority: S) -> Self {
        Self::with_config(authority, CacheConfig::default())
    }

    pub fn with_config(authority: S, config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self { authority, cache }
    }

    /// Number of live cache entries (diagnostic aid).
    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<S: RequestStore> RequestStore for CachedRequestStore<S> {
    async fn fetch(&self, key: &CorrelationId) -> TrackerResult<Option<TrackedRequest>> {
        if let Some(record) = self.cache.get(&key.as_uuid()).await {
            debug!(key = %key, "tracked request cache hit");
            return Ok(Some(record));
        }

        let record = self.authority.fetch(key).await?;

        if let Some(record) = &record {
            debug!(key = %key, "tracked request cache miss, populated from authority");
            self.cache.insert(key.as_uuid(), record.clone()).await;
        }

        Ok(record)
    }

    async fn insert_new(&self, record: &TrackedRequest) -> TrackerResult<bool> {
        // Authority decides the race; only the winner's record is cached
        let inserted = self.authority.insert_new(record).await?;

        if inserted {
            self.cache.insert(record.key.as_uuid(), record.clone()).await;
        }

        Ok(inserted)
    }

    async fn mark_completed(&self, record: &TrackedRequest) -> TrackerResult<()> {
        self.authority.mark_completed(record).await?;
        self.cache.insert(record.key.as_uuid(), record.clone()).await;
        Ok(())
    }

    async fn purge_expired(&self) -> TrackerResult<u64> {
        // Cache entries expire on their own TTL; only the authority purges
        self.authority.purge_expired().await
    }
}
