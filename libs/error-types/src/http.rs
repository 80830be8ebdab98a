//! HTTP error response handling
//!
//! Provides the standard JSON error envelope for REST surfaces and the axum
//! integration that turns [`ServiceError`] values into responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Standard HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Error code for client handling
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Correlation id of the request, when one was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Timestamp of the error
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HttpErrorResponse {
    /// Create new HTTP error response
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            correlation_id: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Attach the correlation id for tracing
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for HttpErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<ServiceError> for HttpErrorResponse {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound { resource, .. } => {
                HttpErrorResponse::new(404, "NOT_FOUND", format!("{} not found", resource))
            }

            ServiceError::InvalidInput { message } => {
                HttpErrorResponse::new(400, "INVALID_INPUT", message)
            }

            ServiceError::Conflict { message } => HttpErrorResponse::new(409, "CONFLICT", message),

            ServiceError::Unavailable { message } => {
                HttpErrorResponse::new(503, "SERVICE_UNAVAILABLE", message)
            }

            ServiceError::Internal { .. } => {
                HttpErrorResponse::new(500, "INTERNAL_ERROR", "Internal server error")
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        HttpErrorResponse::from(self).into_response()
    }
}
