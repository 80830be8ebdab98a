//! In-memory authoritative store
//!
//! DashMap-backed implementation used by tests, local development, and any
//! deployment that accepts losing the tracked window on restart. The entry
//! API makes insert-if-absent atomic per key, so the tracker-level race
//! contract holds here exactly as it does against Postgres.

use async_trait::async_trait;
use chrono::Utc;
use correlation_context::CorrelationId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::TrackerResult;
use crate::model::TrackedRequest;
use crate::store::RequestStore;

/// Default retention, matching the Postgres store.
const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

pub struct InMemoryRequestStore {
    records: DashMap<Uuid, TrackedRequest>,
    retention: Duration,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            records: DashMap::new(),
            retention,
        }
    }

    /// Number of records currently held (test/diagnostic aid).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn fetch(&self, key: &CorrelationId) -> TrackerResult<Option<TrackedRequest>> {
        Ok(self.records.get(&key.as_uuid()).map(|r| r.value().clone()))
    }

    async fn insert_new(&self, record: &TrackedRequest) -> TrackerResult<bool> {
        match self.records.entry(record.key.as_uuid()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn mark_completed(&self, record: &TrackedRequest) -> TrackerResult<()> {
        self.records.insert(record.key.as_uuid(), record.clone());
        Ok(())
    }

    async fn purge_expired(&self) -> TrackerResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::hours(24));

        let before = self.records.len();
        self.records.retain(|_, record| record.created_at >= cutoff);
        let removed = (before - self.records.len()) as u64;

        if removed > 0 {
            debug!(removed, "purged expired in-memory tracked requests");
        }

        Ok(removed)
    }
}
