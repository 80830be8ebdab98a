//! Tower middleware guarding mutating HTTP routes

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{HeaderName, Method};
use axum::response::Response;
use correlation_context::{
    resolve_correlation, CorrelationError, CorrelationId, CORRELATION_HEADER,
};
use request_tracker::{
    DuplicateKind, RecordedResponse, RequestFingerprint, RequestTracker, TrackedRequest,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use crate::response::{encode_headers, reject, replay_response, set_correlation_header};

/// Gate policy: which header carries the identity and which methods are
/// guarded.
#[derive(Clone)]
pub struct GatePolicy {
    pub header: HeaderName,
    pub guarded_methods: Vec<Method>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(CORRELATION_HEADER),
            guarded_methods: vec![Method::POST, Method::PUT, Method::PATCH, Method::DELETE],
        }
    }
}

impl GatePolicy {
    fn is_guarded(&self, method: &Method) -> bool {
        self.guarded_methods.contains(method)
    }
}

/// Layer installing the idempotency gate around an axum router or route.
#[derive(Clone)]
pub struct IdempotencyLayer {
    tracker: Arc<RequestTracker>,
    policy: GatePolicy,
}

impl IdempotencyLayer {
    pub fn new(tracker: Arc<RequestTracker>) -> Self {
        Self {
            tracker,
            policy: GatePolicy::default(),
        }
    }

    pub fn with_policy(tracker: Arc<RequestTracker>, policy: GatePolicy) -> Self {
        Self { tracker, policy }
    }
}

impl<S> Layer<S> for IdempotencyLayer {
    type Service = IdempotencyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdempotencyService {
            inner,
            tracker: self.tracker.clone(),
            policy: self.policy.clone(),
        }
    }
}

/// Service wrapper produced by [`IdempotencyLayer`].
#[derive(Clone)]
pub struct IdempotencyService<S> {
    inner: S,
    tracker: Arc<RequestTracker>,
    policy: GatePolicy,
}

impl<S> Service<Request> for IdempotencyService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Take the ready service, leave a clone behind (standard tower move)
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        if !self.policy.is_guarded(req.method()) {
            let mut inner = inner;
            return Box::pin(async move { inner.call(req).await });
        }

        let tracker = self.tracker.clone();
        let policy = self.policy.clone();

        Box::pin(run_gate(tracker, policy, req, inner))
    }
}

async fn run_gate<S>(
    tracker: Arc<RequestTracker>,
    policy: GatePolicy,
    req: Request,
    mut inner: S,
) -> Result<Response, S::Error>
where
    S: Service<Request, Response = Response>,
{
    // Step 1: resolve the identity before touching the store
    let header_value = req
        .headers()
        .get(&policy.header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let key = match resolve_correlation(header_value.as_deref()) {
        Ok(Some(source)) => source.id(),
        Ok(None) => {
            debug!(method = %req.method(), path = %req.uri().path(), "request rejected: no correlation identity");
            return Ok(reject(
                400,
                "MISSING_CORRELATION_ID",
                &format!("missing or invalid {} header", policy.header),
                None,
            ));
        }
        Err(err @ CorrelationError::AmbiguousContext) => {
            error!(error = %err, "correlation pipeline wiring defect");
            return Ok(reject(
                500,
                "AMBIGUOUS_CORRELATION_CONTEXT",
                "correlation context is ambiguous",
                None,
            ));
        }
        Err(err @ CorrelationError::MissingInMessage) => {
            // An HTTP request should never execute under a consume scope
            error!(error = %err, "consume context observed on the HTTP path");
            return Ok(reject(
                500,
                "CORRELATION_NOT_FOUND",
                "correlation context is defective",
                None,
            ));
        }
    };

    let fingerprint = RequestFingerprint::new(
        req.method().as_str(),
        req.uri().path(),
        req.uri().query().unwrap_or(""),
    );

    // Step 2: find-or-create; store failure fails closed
    let outcome = match tracker.find_or_create(key, &fingerprint).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(key = %key, error = %err, transient = err.is_transient(), "tracking store unavailable, failing closed");
            return Ok(reject(
                503,
                "TRACKING_UNAVAILABLE",
                "request tracking is unavailable, retry with the same correlation id",
                Some(key),
            ));
        }
    };

    // Step 3: repeat submission, classify and answer without executing
    if !outcome.created {
        return Ok(answer_duplicate(&outcome.record, &fingerprint, key));
    }

    // Step 4: first observation, execute downstream and record the outcome
    let response = inner.call(req).await?;
    Ok(record_and_forward(&tracker, outcome.record, response, key).await)
}

fn answer_duplicate(
    record: &TrackedRequest,
    fingerprint: &RequestFingerprint,
    key: CorrelationId,
) -> Response {
    match RequestTracker::classify(record, fingerprint) {
        DuplicateKind::Mismatch => {
            warn!(
                key = %key,
                stored_method = %record.method,
                stored_path = %record.path,
                method = %fingerprint.method,
                path = %fingerprint.path,
                "correlation id reused with a different request fingerprint"
            );
            reject(
                409,
                "IDEMPOTENCY_KEY_REUSED",
                "correlation id was already used with a different method, path, or query",
                Some(key),
            )
        }
        DuplicateKind::InFlight => {
            debug!(key = %key, "duplicate of an in-flight request rejected");
            reject(
                409,
                "REQUEST_IN_FLIGHT",
                "a request with this correlation id is still being processed, retry after backoff",
                Some(key),
            )
        }
        DuplicateKind::Replay => {
            debug!(key = %key, status = ?record.status_code, "replaying recorded response");
            replay_response(record, key)
        }
    }
}

async fn record_and_forward(
    tracker: &RequestTracker,
    record: TrackedRequest,
    response: Response,
    key: CorrelationId,
) -> Response {
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The handler ran but its body stream failed; nothing replayable
            // was produced. The pending record is reclaimed by retention.
            error!(key = %key, error = %err, "failed to buffer downstream response body");
            return reject(
                500,
                "RESPONSE_CAPTURE_FAILED",
                "downstream response could not be captured",
                Some(key),
            );
        }
    };

    let body_text = if bytes.is_empty() {
        None
    } else {
        match std::str::from_utf8(&bytes) {
            Ok(text) => Some(text.to_owned()),
            Err(_) => {
                warn!(key = %key, "non-UTF-8 response body recorded lossily");
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    };

    let recorded = RecordedResponse {
        status: parts.status.as_u16(),
        headers: encode_headers(&parts.headers),
        body: body_text,
    };

    if let Err(err) = tracker.record_result(record, recorded).await {
        // The caller still gets the real response; the record stays pending
        // until retention purge reclaims it.
        error!(key = %key, error = %err, "failed to record idempotent result");
    }

    let mut response = Response::from_parts(parts, Body::from(bytes));
    set_correlation_header(&mut response, key);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_guards_mutating_methods() {
        let policy = GatePolicy::default();

        assert!(policy.is_guarded(&Method::POST));
        assert!(policy.is_guarded(&Method::PUT));
        assert!(policy.is_guarded(&Method::PATCH));
        assert!(policy.is_guarded(&Method::DELETE));
        assert!(!policy.is_guarded(&Method::GET));
        assert!(!policy.is_guarded(&Method::HEAD));
        assert!(!policy.is_guarded(&Method::OPTIONS));
    }
}
