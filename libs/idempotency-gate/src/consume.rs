//! Message-consumption frontend
//!
//! Applies the same resolve → find-or-create → classify → record sequence as
//! the HTTP layer, for handlers invoked per consumed bus message. The gate
//! installs the consume-context scope itself, so the shared resolver sees
//! the message's correlation identity and handler code stays
//! transport-agnostic.

use correlation_context::{
    resolve_correlation, with_consume_context, ConsumeContext, CorrelationError,
};
use request_tracker::{
    DuplicateKind, RecordedResponse, RequestFingerprint, RequestTracker, TrackerError,
    TrackedRequest,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of gating one consumed message.
#[derive(Debug)]
pub enum ConsumeOutcome {
    /// First observation: the handler ran and its result was recorded.
    Executed(TrackedRequest),
    /// Exact duplicate of a completed message; the stored result is returned
    /// without re-executing the handler.
    Replayed(TrackedRequest),
    /// Same key is still being processed elsewhere; the collaborator should
    /// redeliver after backoff.
    InFlight,
    /// Key reused with a different fingerprint; never executed.
    Rejected(TrackedRequest),
}

impl ConsumeOutcome {
    /// Whether the message's effect is (now) recorded: first execution or
    /// duplicate of one.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Executed(_) | Self::Replayed(_))
    }
}

/// Errors escaping the consume gate.
///
/// `Correlation(MissingInMessage)` marks a defective message: reject or
/// dead-letter per the messaging collaborator's policy.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Handler failed before a result could be recorded; the pending record
    /// is reclaimed by retention purge and a redelivery may retry safely.
    #[error("message handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct ConsumeGate {
    tracker: Arc<RequestTracker>,
}

impl ConsumeGate {
    pub fn new(tracker: Arc<RequestTracker>) -> Self {
        Self { tracker }
    }

    /// Gate one consumed message.
    ///
    /// Installs `ctx` as the ambient consume context, resolves the identity
    /// through the shared resolver, and applies the find-or-create /
    /// classification sequence. `handler` is invoked at most once per
    /// correlation key observed by the tracked store.
    pub async fn process<F, Fut>(
        &self,
        ctx: ConsumeContext,
        fingerprint: RequestFingerprint,
        handler: F,
    ) -> Result<ConsumeOutcome, ConsumeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RecordedResponse, anyhow::Error>>,
    {
        let tracker = self.tracker.clone();

        with_consume_context(ctx, async move {
            let source = resolve_correlation(None)?
                .ok_or(CorrelationError::MissingInMessage)?;
            let key = source.id();

            let outcome = tracker.find_or_create(key, &fingerprint).await?;

            if !outcome.created {
                return Ok(match RequestTracker::classify(&outcome.record, &fingerprint) {
                    DuplicateKind::Mismatch => {
                        warn!(key = %key, "correlation id reused by a different message fingerprint");
                        ConsumeOutcome::Rejected(outcome.record)
                    }
                    DuplicateKind::InFlight => {
                        debug!(key = %key, "duplicate delivery of an in-flight message");
                        ConsumeOutcome::InFlight
                    }
                    DuplicateKind::Replay => {
                        debug!(key = %key, "duplicate delivery of a completed message");
                        ConsumeOutcome::Replayed(outcome.record)
                    }
                });
            }

            let response = handler().await.map_err(ConsumeError::Handler)?;
            let completed = tracker.record_result(outcome.record, response).await?;
            Ok(ConsumeOutcome::Executed(completed))
        })
        .await
    }
}
