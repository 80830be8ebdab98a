//! Find-or-create and duplicate classification
//!
//! Turns the raw store operations into the idempotency decision procedure
//! the gate consumes.

use correlation_context::CorrelationId;
use std::sync::Arc;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::model::{RecordedResponse, RequestFingerprint, TrackedRequest};
use crate::store::RequestStore;

/// Outcome of [`RequestTracker::find_or_create`].
#[derive(Debug, Clone)]
pub struct FindOrCreate {
    /// Whether this call created the record. Of n concurrent calls for one
    /// key exactly one observes `true`; the rest receive the winner's record.
    pub created: bool,
    pub record: TrackedRequest,
}

/// Classification of a repeat submission (`created == false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Same key, different (method, path, query): conflicting reuse. Never
    /// executed, stored record never overwritten.
    Mismatch,
    /// Same fingerprint, original execution still pending. Rejected
    /// immediately rather than waited on; the caller retries after backoff.
    InFlight,
    /// Same fingerprint, completed: the stored result is replayed verbatim.
    Replay,
}

#[derive(Clone)]
pub struct RequestTracker {
    store: Arc<dyn RequestStore>,
}

impl RequestTracker {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    /// Find the record owning `key`, or create it.
    ///
    /// The create path relies on the store's atomic insert-if-absent: when
    /// two units of work race on a new key, one observes `created == true`
    /// and the other is handed the winner's record, even if still pending.
    pub async fn find_or_create(
        &self,
        key: CorrelationId,
        fingerprint: &RequestFingerprint,
    ) -> TrackerResult<FindOrCreate> {
        if let Some(record) = self.store.fetch(&key).await? {
            return Ok(FindOrCreate {
                created: false,
                record,
            });
        }

        let record = TrackedRequest::pending(key, fingerprint);
        if self.store.insert_new(&record).await? {
            debug!(key = %key, method = %fingerprint.method, path = %fingerprint.path, "request tracked");
            return Ok(FindOrCreate {
                created: true,
                record,
            });
        }

        // Lost the create race; the winner's record must be visible now.
        debug!(key = %key, "lost create race, fetching winning record");
        match self.store.fetch(&key).await? {
            Some(record) => Ok(FindOrCreate {
                created: false,
                record,
            }),
            None => Err(TrackerError::LostRecord(key)),
        }
    }

    /// Classify a repeat submission against the stored record.
    pub fn classify(record: &TrackedRequest, fingerprint: &RequestFingerprint) -> DuplicateKind {
        if !record.matches(fingerprint) {
            DuplicateKind::Mismatch
        } else if record.is_completed() {
            DuplicateKind::Replay
        } else {
            DuplicateKind::InFlight
        }
    }

    /// Record the outcome of the execution that created `record`.
    ///
    /// Must be called exactly once per key, only by the caller that observed
    /// `created == true`. Returns the completed record.
    pub async fn record_result(
        &self,
        record: TrackedRequest,
        response: RecordedResponse,
    ) -> TrackerResult<TrackedRequest> {
        let completed = record.into_completed(response);
        self.store.mark_completed(&completed).await?;
        debug!(key = %completed.key, status = ?completed.status_code, "request result recorded");
        Ok(completed)
    }
}
