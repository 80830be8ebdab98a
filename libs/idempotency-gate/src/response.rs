//! Response construction for rejections and replays

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use correlation_context::{CorrelationId, CORRELATION_HEADER};
use error_types::HttpErrorResponse;
use request_tracker::{StoredHeaders, TrackedRequest};
use tracing::warn;

/// Marker header distinguishing a replayed response from a first execution.
pub const REPLAY_HEADER: &str = "x-idempotent-replay";

/// Connection-level headers that must not be copied onto a replayed
/// response; they describe the original transfer, not the stored payload.
const SKIPPED_ON_REPLAY: &[&str] = &["connection", "transfer-encoding"];

/// Build a structured rejection response.
pub(crate) fn reject(
    status: u16,
    code: &str,
    message: &str,
    key: Option<CorrelationId>,
) -> Response {
    let mut envelope = HttpErrorResponse::new(status, code, message);
    if let Some(key) = key {
        envelope = envelope.with_correlation_id(key.to_string());
    }

    let mut response = envelope.into_response();
    if let Some(key) = key {
        set_correlation_header(&mut response, key);
    }
    response
}

/// Rebuild the recorded response of a completed duplicate, verbatim.
pub(crate) fn replay_response(record: &TrackedRequest, key: CorrelationId) -> Response {
    let status = record
        .status_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = record.response_body.clone().unwrap_or_default();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    if let Some(stored) = &record.response_headers {
        for (name, values) in stored {
            if SKIPPED_ON_REPLAY.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!(key = %key, header = %name, "stored header name is invalid, skipping on replay");
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(header_value) => {
                        response.headers_mut().append(header_name.clone(), header_value);
                    }
                    Err(_) => {
                        warn!(key = %key, header = %name, "stored header value is invalid, skipping on replay");
                    }
                }
            }
        }
    }

    response
        .headers_mut()
        .insert(REPLAY_HEADER, HeaderValue::from_static("true"));
    set_correlation_header(&mut response, key);
    response
}

/// Echo the resolved correlation id on the response.
pub(crate) fn set_correlation_header(response: &mut Response, key: CorrelationId) {
    if let Ok(value) = HeaderValue::from_str(&key.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
}

/// Flatten a response header map into the stored multimap form.
///
/// Values that are not valid UTF-8 cannot round-trip through the stored
/// envelope and are dropped with a warning.
pub(crate) fn encode_headers(headers: &HeaderMap) -> StoredHeaders {
    let mut stored = StoredHeaders::new();
    for (name, value) in headers {
        match value.to_str() {
            Ok(text) => stored
                .entry(name.as_str().to_string())
                .or_default()
                .push(text.to_string()),
            Err(_) => {
                warn!(header = %name, "non-UTF-8 response header dropped from recorded state");
            }
        }
    }
    stored
}
