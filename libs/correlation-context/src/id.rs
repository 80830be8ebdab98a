//! Correlation identity value type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Rejected correlation identifier (not a UUID)
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid correlation id: {0:?}")]
pub struct InvalidCorrelationId(pub String);

/// Opaque, globally-unique identity scoping "the same logical request"
/// across retries and transports.
///
/// Wraps a UUID; any RFC 4122 textual form is accepted on parse. Within one
/// execution context at most one `CorrelationId` is active (enforced by the
/// resolver, not this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh identity, for first hops that did not receive one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied header or metadata value.
    pub fn parse(value: &str) -> Result<Self, InvalidCorrelationId> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| InvalidCorrelationId(value.to_string()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CorrelationId {
    type Err = InvalidCorrelationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
