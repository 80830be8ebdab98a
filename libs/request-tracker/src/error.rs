//! Error types for request tracking

use correlation_context::CorrelationId;
use thiserror::Error;

/// Result type for tracking operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors that can occur while tracking requests
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Authoritative store operation failed (connection, query execution)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored response state could not be encoded or decoded
    #[error("response state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record did not round-trip (unknown state value, status code
    /// out of range)
    #[error("corrupt tracked record: {0}")]
    Corrupt(String),

    /// An insert lost the create race but the winning record was gone on
    /// re-read, possible only when retention purge interleaves. Safe to
    /// retry with backoff.
    #[error("tracked record for {0} disappeared mid-operation")]
    LostRecord(CorrelationId),
}

impl TrackerError {
    /// Check if the error is transient (caller should retry with backoff)
    pub fn is_transient(&self) -> bool {
        match self {
            TrackerError::Database(sqlx_err) => matches!(
                sqlx_err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            TrackerError::LostRecord(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TrackerError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(TrackerError::LostRecord(CorrelationId::generate()).is_transient());
        assert!(!TrackerError::Corrupt("bad state".into()).is_transient());
    }
}
