//! # Request Tracker Library
//!
//! Race-safe tracking of idempotency-guarded requests, keyed by correlation
//! identity. One [`TrackedRequest`] record exists per correlation id observed
//! by the service; it is created exactly once in `Pending` state, completed
//! exactly once with the recorded response, and reclaimed by retention
//! expiry.
//!
//! ## Problem
//!
//! Without persistent tracking, a retried or concurrently duplicated request
//! executes its side effects again: duplicate resources, duplicate charges,
//! duplicate notifications.
//!
//! ## Solution
//!
//! - **Atomic create**: [`RequestStore::insert_new`] is a single
//!   insert-if-absent against the authoritative store, so of n concurrent
//!   submissions of one key exactly one observes "created".
//! - **Fingerprinting**: the (method, path, query) tuple captured at first
//!   observation detects conflicting reuse of a key.
//! - **Response recording**: status, headers, and body are persisted on
//!   completion so exact duplicates can be replayed verbatim.
//! - **Cache-aside**: a per-instance in-memory cache fronts the authoritative
//!   store as a read optimization only; correctness holds with the cache
//!   removed.
//!
//! ## Architecture
//!
//! ```text
//! IdempotencyGate → RequestTracker → CachedRequestStore (optional)
//!                                         ↓
//!                                  PostgresRequestStore
//!                                  (tracked_requests table)
//! ```

mod error;
mod model;
mod tracker;

pub mod store;

pub use error::{TrackerError, TrackerResult};
pub use model::{RecordedResponse, RequestFingerprint, RequestState, StoredHeaders, TrackedRequest};
pub use store::{
    CacheConfig, CachedRequestStore, InMemoryRequestStore, PostgresRequestStore, RequestStore,
};
pub use tracker::{DuplicateKind, FindOrCreate, RequestTracker};
