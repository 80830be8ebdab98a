//! Environment-driven service configuration

use request_tracker::CacheConfig;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP bind host (`HTTP_HOST`)
    pub http_host: String,

    /// HTTP bind port (`PORT`)
    pub http_port: u16,

    /// Authoritative store DSN (`DATABASE_URL`); in-memory store when unset
    pub database_url: Option<String>,

    /// Tracked request cache TTL in seconds (`TRACKER_CACHE_TTL_SECS`)
    pub cache_ttl_secs: u64,

    /// Tracked request cache capacity (`TRACKER_CACHE_MAX_ENTRIES`)
    pub cache_max_entries: u64,

    /// Authoritative retention in hours (`TRACKER_RETENTION_HOURS`)
    pub retention_hours: u64,

    /// Purge loop interval in seconds (`TRACKER_PURGE_INTERVAL_SECS`)
    pub purge_interval_secs: u64,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_parse("PORT", 8080),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            cache_ttl_secs: env_parse("TRACKER_CACHE_TTL_SECS", 300),
            cache_max_entries: env_parse("TRACKER_CACHE_MAX_ENTRIES", 10_000),
            retention_hours: env_parse("TRACKER_RETENTION_HOURS", 24),
            purge_interval_secs: env_parse("TRACKER_PURGE_INTERVAL_SECS", 3600),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_entries: self.cache_max_entries,
        }
    }

    pub fn log_config(&self) {
        info!(
            host = %self.http_host,
            port = self.http_port,
            persistent_store = self.database_url.is_some(),
            cache_ttl_secs = self.cache_ttl_secs,
            retention_hours = self.retention_hours,
            "fleet-api configuration loaded"
        );
    }
}
