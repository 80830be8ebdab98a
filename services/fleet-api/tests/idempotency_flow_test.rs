//! End-to-end idempotency flow against the real service router
//!
//! The canonical client story: create a car with an idempotency key, retry
//! the create, then try to reuse the key for a different mutation. Also
//! covers the message path settling against the same tracked store.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use correlation_context::{CorrelationId, CORRELATION_HEADER};
use fleet_api::cars::{Car, CarRepository};
use fleet_api::consumer::CarCommandConsumer;
use fleet_api::routes::{build_router, AppState};
use idempotency_gate::{ConsumeGate, ConsumeOutcome, REPLAY_HEADER};
use request_tracker::{InMemoryRequestStore, RequestStore, RequestTracker};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    router: Router,
    consumer: CarCommandConsumer,
    cars: Arc<CarRepository>,
}

fn harness() -> Harness {
    let store: Arc<dyn RequestStore> = Arc::new(InMemoryRequestStore::new());
    let tracker = Arc::new(RequestTracker::new(store));
    let cars = Arc::new(CarRepository::new());

    let router = build_router(AppState { cars: cars.clone() }, tracker.clone());
    let consumer = CarCommandConsumer::new(ConsumeGate::new(tracker), cars.clone());

    Harness {
        router,
        consumer,
        cars,
    }
}

fn json_request(method: Method, uri: &str, key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(CORRELATION_HEADER, key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const CREATE_BODY: &str = r#"{"make":"Volvo","model":"XC40","year":2024}"#;

#[tokio::test]
async fn test_create_retry_and_conflicting_reuse() {
    let h = harness();
    let key = CorrelationId::generate().to_string();

    // First create succeeds and returns the new car
    let first = h
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/cars", Some(&key), CREATE_BODY))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_bytes = to_bytes(first.into_body(), usize::MAX).await.unwrap();
    let car: Car = serde_json::from_slice(&first_bytes).unwrap();

    // Client retry with the same key: recorded response replayed, no new car
    let retry = h
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/cars", Some(&key), CREATE_BODY))
        .await
        .unwrap();
    assert_eq!(retry.status(), StatusCode::CREATED);
    assert_eq!(retry.headers().get(REPLAY_HEADER).unwrap(), "true");

    let retry_bytes = to_bytes(retry.into_body(), usize::MAX).await.unwrap();
    assert_eq!(retry_bytes, first_bytes, "replay must be byte-for-byte");
    assert_eq!(h.cars.len(), 1, "retry must not create a second car");

    // Reusing the key for a different mutation is a conflict
    let reused = h
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/cars/{}", car.id),
            Some(&key),
            r#"{"year":2026}"#,
        ))
        .await
        .unwrap();
    assert_eq!(reused.status(), StatusCode::CONFLICT);
    let envelope: serde_json::Value =
        serde_json::from_slice(&to_bytes(reused.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(envelope["code"], "IDEMPOTENCY_KEY_REUSED");
    assert_eq!(h.cars.get(car.id).unwrap().year, 2024, "patch never ran");

    // A fresh key lets the patch through
    let fresh_key = CorrelationId::generate().to_string();
    let patched = h
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/cars/{}", car.id),
            Some(&fresh_key),
            r#"{"year":2026}"#,
        ))
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::OK);
    assert_eq!(h.cars.get(car.id).unwrap().year, 2026);
}

#[tokio::test]
async fn test_create_without_key_is_rejected_before_execution() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/cars", None, CREATE_BODY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.cars.is_empty());
}

#[tokio::test]
async fn test_reads_require_no_key() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/cars")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_message_and_http_share_one_tracked_store() {
    let h = harness();
    let key = CorrelationId::generate().to_string();

    // Command arrives over the bus first
    let payload = format!(
        r#"{{"message_id":"m-1","correlation_id":"{}","command":{{"type":"register_car","make":"Volvo","model":"EX30","year":2025}}}}"#,
        key
    );
    let outcome = h.consumer.handle_message(payload.as_bytes()).await.unwrap();
    assert!(matches!(outcome, ConsumeOutcome::Executed(_)));
    assert_eq!(h.cars.len(), 1);

    // The same key presented over HTTP has a different fingerprint: conflict
    let response = h
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/cars", Some(&key), CREATE_BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(h.cars.len(), 1);
}
