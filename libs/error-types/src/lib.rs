//! Unified error types for Fleet services
//!
//! Provides the shared service error enum and the JSON error envelope every
//! HTTP surface returns, so clients see one consistent shape regardless of
//! which service or middleware produced the rejection.

use thiserror::Error;

pub mod http;

pub use http::HttpErrorResponse;

/// Result type for service-level operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Core service error type used across Fleet services
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Resource not found
    #[error("{resource} not found")]
    NotFound {
        resource: &'static str,
        id: String,
    },

    /// Invalid input provided
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Conflict (e.g., duplicate resource)
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// A required collaborator is unreachable
    #[error("service temporarily unavailable: {message}")]
    Unavailable { message: String },

    /// Internal server error (catch-all)
    #[error("internal server error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(source: anyhow::Error) -> Self {
        Self::Internal { source }
    }
}
