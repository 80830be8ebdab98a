//! End-to-end tests of the HTTP idempotency gate
//!
//! Drives a small axum router through the layer with `oneshot`, covering the
//! full decision surface: missing identity, first execution + recording,
//! verbatim replay, conflicting key reuse, in-flight duplicates, and method
//! bypass.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::{get, patch, post};
use axum::Router;
use correlation_context::{CorrelationId, CORRELATION_HEADER};
use idempotency_gate::{IdempotencyLayer, REPLAY_HEADER};
use request_tracker::{InMemoryRequestStore, RequestStore, RequestTracker};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

struct Harness {
    router: Router,
    store: Arc<InMemoryRequestStore>,
    hits: Arc<AtomicU32>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryRequestStore::new());
    let tracker = Arc::new(RequestTracker::new(store.clone() as Arc<dyn RequestStore>));
    let hits = Arc::new(AtomicU32::new(0));

    let create_hits = hits.clone();
    let update_hits = hits.clone();

    let router = Router::new()
        .route(
            "/cars",
            post(move || {
                let hits = create_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::CREATED,
                        [(header::CONTENT_TYPE, "application/json")],
                        "{\"carId\":7}",
                    )
                }
            }),
        )
        .route(
            "/cars/:id",
            patch(move || {
                let hits = update_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::OK,
                        [(header::CONTENT_TYPE, "application/json")],
                        "{\"carId\":7,\"year\":2026}",
                    )
                }
            }),
        )
        .route("/health", get(|| async { "OK" }))
        .layer(IdempotencyLayer::new(tracker));

    Harness {
        router,
        store,
        hits,
    }
}

fn request(method: Method, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(CORRELATION_HEADER, key);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_identity_rejected_before_store_interaction() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(request(Method::POST, "/cars", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "MISSING_CORRELATION_ID");

    // No handler execution, no pending record
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_malformed_identity_treated_as_missing() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some("order-1234")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_first_execution_records_and_echoes_correlation() {
    let h = harness();
    let key = CorrelationId::generate();

    let response = h
        .router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some(&key.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get(CORRELATION_HEADER).unwrap(),
        &key.to_string()
    );
    assert!(response.headers().get(REPLAY_HEADER).is_none());

    let record = h.store.fetch(&key).await.unwrap().unwrap();
    assert!(record.is_completed());
    assert_eq!(record.status_code, Some(201));
    assert_eq!(record.response_body.as_deref(), Some("{\"carId\":7}"));
}

#[tokio::test]
async fn test_completed_duplicate_replays_verbatim() {
    let h = harness();
    let key = CorrelationId::generate();

    let first = h
        .router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some(&key.to_string())))
        .await
        .unwrap();
    let first_status = first.status();
    let first_body = to_bytes(first.into_body(), usize::MAX).await.unwrap();

    let second = h
        .router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some(&key.to_string())))
        .await
        .unwrap();

    assert_eq!(second.status(), first_status);
    assert_eq!(second.headers().get(REPLAY_HEADER).unwrap(), "true");
    assert_eq!(
        second.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let second_body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
    assert_eq!(second_body, first_body, "replay must be byte-for-byte");

    // Handler ran exactly once; no second car was created
    assert_eq!(h.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_key_reuse_with_different_fingerprint_conflicts() {
    let h = harness();
    let key = CorrelationId::generate();

    let first = h
        .router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some(&key.to_string())))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    // Same key, different method and path
    let reused = h
        .router
        .clone()
        .oneshot(request(Method::PATCH, "/cars/7", Some(&key.to_string())))
        .await
        .unwrap();

    assert_eq!(reused.status(), StatusCode::CONFLICT);
    let body = body_json(reused).await;
    assert_eq!(body["code"], "IDEMPOTENCY_KEY_REUSED");

    // The PATCH handler never ran
    assert_eq!(h.hits.load(Ordering::SeqCst), 1);

    // The stored record was not overwritten
    let record = h.store.fetch(&key).await.unwrap().unwrap();
    assert_eq!(record.method, "POST");
    assert_eq!(record.path, "/cars");
}

#[tokio::test]
async fn test_query_string_is_part_of_the_fingerprint() {
    let h = harness();
    let key = CorrelationId::generate();

    h.router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some(&key.to_string())))
        .await
        .unwrap();

    let reused = h
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/cars?dry_run=1",
            Some(&key.to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(reused.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unguarded_methods_bypass_the_gate() {
    let h = harness();

    // No correlation header required on GET
    let response = h
        .router
        .clone()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_same_key_one_executes_one_in_flight() {
    let store = Arc::new(InMemoryRequestStore::new());
    let tracker = Arc::new(RequestTracker::new(store.clone() as Arc<dyn RequestStore>));
    let hits = Arc::new(AtomicU32::new(0));
    let release = Arc::new(Notify::new());

    let handler_hits = hits.clone();
    let handler_release = release.clone();
    let router = Router::new()
        .route(
            "/cars",
            post(move || {
                let hits = handler_hits.clone();
                let release = handler_release.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    // Hold the first request open until the duplicate has been answered
                    release.notified().await;
                    (StatusCode::CREATED, "{\"carId\":7}")
                }
            }),
        )
        .layer(IdempotencyLayer::new(tracker));

    let key = CorrelationId::generate();

    let first = tokio::spawn(
        router
            .clone()
            .oneshot(request(Method::POST, "/cars", Some(&key.to_string()))),
    );

    // Let the first request reach the handler
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let duplicate = router
        .clone()
        .oneshot(request(Method::POST, "/cars", Some(&key.to_string())))
        .await
        .unwrap();

    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body = body_json(duplicate).await;
    assert_eq!(body["code"], "REQUEST_IN_FLIGHT");

    release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    // Exactly one execution despite two submissions
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
