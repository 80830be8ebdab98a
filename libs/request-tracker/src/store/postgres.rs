//! PostgreSQL authoritative store
//!
//! Persistent tracking storage backing the idempotency contract across
//! service restarts. The create path is a single
//! `INSERT ... ON CONFLICT DO NOTHING` checked via `rows_affected`, so of n
//! concurrent creates for one key the database admits exactly one. There is
//! no check-then-act window to race through, in this instance or any other
//! sharing the table.
//!
//! Schema (see the service `migrations/` directory):
//!
//! ```sql
//! CREATE TABLE tracked_requests (
//!     correlation_id   UUID PRIMARY KEY,
//!     method           TEXT NOT NULL,
//!     path             TEXT NOT NULL,
//!     query            TEXT NOT NULL DEFAULT '',
//!     state            TEXT NOT NULL DEFAULT 'pending',
//!     status_code      INTEGER,
//!     response_headers JSONB,
//!     response_body    TEXT,
//!     created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     completed_at     TIMESTAMPTZ
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use correlation_context::CorrelationId;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};
use crate::model::{RequestState, StoredHeaders, TrackedRequest};
use crate::store::RequestStore;

/// Default authoritative retention: long enough for audit and duplicate
/// detection well past any cache window.
const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

#[derive(Clone)]
pub struct PostgresRequestStore {
    pool: PgPool,
    retention: Duration,
}

impl PostgresRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_retention(pool, DEFAULT_RETENTION)
    }

    pub fn with_retention(pool: PgPool, retention: Duration) -> Self {
        Self { pool, retention }
    }

    fn record_from_row(row: &PgRow) -> TrackerResult<TrackedRequest> {
        let key: Uuid = row.try_get("correlation_id")?;
        let state_raw: String = row.try_get("state")?;
        let state = RequestState::parse(&state_raw)
            .ok_or_else(|| TrackerError::Corrupt(format!("unknown state {:?}", state_raw)))?;

        let status_code: Option<i32> = row.try_get("status_code")?;
        let status_code = status_code
            .map(|code| {
                u16::try_from(code)
                    .map_err(|_| TrackerError::Corrupt(format!("status code {} out of range", code)))
            })
            .transpose()?;

        let headers: Option<serde_json::Value> = row.try_get("response_headers")?;
        let response_headers = headers
            .map(serde_json::from_value::<StoredHeaders>)
            .transpose()?;

        Ok(TrackedRequest {
            key: CorrelationId::new(key),
            method: row.try_get("method")?,
            path: row.try_get("path")?,
            query: row.try_get("query")?,
            state,
            status_code,
            response_headers,
            response_body: row.try_get("response_body")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        })
    }
}

#[async_trait]
impl RequestStore for PostgresRequestStore {
    async fn fetch(&self, key: &CorrelationId) -> TrackerResult<Option<TrackedRequest>> {
        let row = sqlx::query(
            r#"
            SELECT correlation_id, method, path, query, state, status_code,
                   response_headers, response_body, created_at, completed_at
            FROM tracked_requests
            WHERE correlation_id = $1
            "#,
        )
        .bind(key.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn insert_new(&self, record: &TrackedRequest) -> TrackerResult<bool> {
        // INSERT ... ON CONFLICT DO NOTHING: a losing racer affects 0 rows
        let result = sqlx::query(
            r#"
            INSERT INTO tracked_requests (correlation_id, method, path, query, state, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (correlation_id) DO NOTHING
            "#,
        )
        .bind(record.key.as_uuid())
        .bind(&record.method)
        .bind(&record.path)
        .bind(&record.query)
        .bind(record.state.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        let was_inserted = result.rows_affected() > 0;

        if was_inserted {
            debug!(key = %record.key, method = %record.method, path = %record.path, "tracked request created");
        } else {
            debug!(key = %record.key, "tracked request already exists");
        }

        Ok(was_inserted)
    }

    async fn mark_completed(&self, record: &TrackedRequest) -> TrackerResult<()> {
        let headers = record
            .response_headers
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE tracked_requests
            SET state = $2, status_code = $3, response_headers = $4,
                response_body = $5, completed_at = $6
            WHERE correlation_id = $1
            "#,
        )
        .bind(record.key.as_uuid())
        .bind(record.state.as_str())
        .bind(record.status_code.map(i32::from))
        .bind(headers)
        .bind(&record.response_body)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await?;

        debug!(key = %record.key, status = ?record.status_code, "tracked request completed");
        Ok(())
    }

    async fn purge_expired(&self) -> TrackerResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::hours(24));

        let result = sqlx::query("DELETE FROM tracked_requests WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "purged expired tracked requests");
        }

        Ok(deleted)
    }
}
