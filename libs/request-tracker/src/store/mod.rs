//! Tracked request storage
//!
//! One trait, interchangeable implementations: Postgres as the authoritative
//! store, an in-memory store for tests and local development, and a
//! cache-aside decorator that fronts either with a bounded in-memory cache.

mod cached;
mod memory;
mod postgres;

pub use cached::{CacheConfig, CachedRequestStore};
pub use memory::InMemoryRequestStore;
pub use postgres::PostgresRequestStore;

use async_trait::async_trait;
use correlation_context::CorrelationId;
use std::sync::Arc;

use crate::error::TrackerResult;
use crate::model::TrackedRequest;

/// Storage contract for tracked requests.
///
/// Implementations hand out fresh copies of records; callers never receive a
/// reference into the store's own state.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Look up the record for `key`, if one exists.
    async fn fetch(&self, key: &CorrelationId) -> TrackerResult<Option<TrackedRequest>>;

    /// Atomic insert-if-absent of a freshly built `Pending` record.
    ///
    /// Returns `false` when a record for the key already exists. This is the
    /// single operation that closes the create race: it must be one atomic
    /// insert against the store, never an exists-check followed by an insert.
    async fn insert_new(&self, record: &TrackedRequest) -> TrackerResult<bool>;

    /// Persist the completed form of a record previously created through
    /// [`RequestStore::insert_new`].
    async fn mark_completed(&self, record: &TrackedRequest) -> TrackerResult<()>;

    /// Delete records older than the store's retention window.
    ///
    /// Returns the number of records removed. Also the backstop that
    /// reclaims records stuck in `Pending` after an aborted completion
    /// write.
    async fn purge_expired(&self) -> TrackerResult<u64>;
}

#[async_trait]
impl<T: RequestStore + ?Sized> RequestStore for Arc<T> {
    async fn fetch(&self, key: &CorrelationId) -> TrackerResult<Option<TrackedRequest>> {
        (**self).fetch(key).await
    }

    async fn insert_new(&self, record: &TrackedRequest) -> TrackerResult<bool> {
        (**self).insert_new(record).await
    }

    async fn mark_completed(&self, record: &TrackedRequest) -> TrackerResult<()> {
        (**self).mark_completed(record).await
    }

    async fn purge_expired(&self) -> TrackerResult<u64> {
        (**self).purge_expired().await
    }
}
