//! Tracked request data model

use chrono::{DateTime, Utc};
use correlation_context::CorrelationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Recorded response headers: name → values, preserving multi-valued headers.
pub type StoredHeaders = HashMap<String, Vec<String>>;

/// Lifecycle state of a tracked request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Created, owning execution not yet finished
    Pending,
    /// Result recorded, eligible for replay
    Completed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// The (method, path, query) tuple captured at first observation of a key,
/// used to detect conflicting reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFingerprint {
    pub method: String,
    pub path: String,
    pub query: String,
}

impl RequestFingerprint {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: query.into(),
        }
    }
}

/// Response state captured when the owning execution completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: StoredHeaders,
    pub body: Option<String>,
}

/// One record per correlation identity observed by this service.
///
/// Created exactly once in [`RequestState::Pending`] by the tracker's
/// find-or-create; mutated exactly once, by the execution that created it,
/// to [`RequestState::Completed`] with the result fields populated. The
/// fingerprint fields are immutable after creation. Stores hand out fresh
/// copies; callers never hold a record past one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRequest {
    pub key: CorrelationId,
    pub method: String,
    pub path: String,
    pub query: String,
    pub state: RequestState,
    pub status_code: Option<u16>,
    pub response_headers: Option<StoredHeaders>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackedRequest {
    /// Build the pending record for the first observation of `key`.
    pub fn pending(key: CorrelationId, fingerprint: &RequestFingerprint) -> Self {
        Self {
            key,
            method: fingerprint.method.clone(),
            path: fingerprint.path.clone(),
            query: fingerprint.query.clone(),
            state: RequestState::Pending,
            status_code: None,
            response_headers: None,
            response_body: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Consume the pending record into its completed form.
    pub fn into_completed(mut self, response: RecordedResponse) -> Self {
        self.state = RequestState::Completed;
        self.status_code = Some(response.status);
        self.response_headers = Some(response.headers);
        self.response_body = response.body;
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn fingerprint(&self) -> RequestFingerprint {
        RequestFingerprint {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
        }
    }

    /// Whether the incoming request's fingerprint matches the one captured
    /// at creation.
    pub fn matches(&self, fingerprint: &RequestFingerprint) -> bool {
        self.method == fingerprint.method
            && self.path == fingerprint.path
            && self.query == fingerprint.query
    }

    pub fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.state == RequestState::Completed
    }
}
