//! Redis read-through cache for board aggregates.
//!
//! Dashboard counts are recomputed from every bid in a view, so they are
//! cached briefly and dropped whenever a bid changes. Redis
//! is optional; every failure here is logged and treated as a miss.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!(ttl_secs = default_ttl_seconds, "Redis cache connected");

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();

        let hit = match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!(key = key, error = %e, "Redis get error");
                None
            }
        };

        tracing::Span::current().record("cache_hit", hit.is_some());
        hit
    }

    /// Store with the default TTL. Errors are logged, never returned.
    #[instrument(skip(self, value))]
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.set_with_ttl(key, value, self.default_ttl).await {
            warn!(key = key, error = %e, "Cache write failed");
        }
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(value).context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key = key, ttl_secs = ttl.as_secs(), "Cached value");
        Ok(())
    }

    /// Delete all keys matching a glob pattern
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .context("Failed to scan cache keys")?;

            if !keys.is_empty() {
                let n: i64 = conn.del(&keys).await.context("Failed to delete cache keys")?;
                deleted += n.max(0) as usize;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern = pattern, deleted = deleted, "Cache pattern delete");
        Ok(deleted)
    }

    /// Drop every board aggregate after a write
    pub async fn invalidate_board(&self) {
        if let Err(e) = self.delete_pattern(keys::BOARD_PATTERN).await {
            warn!(error = %e, "Board cache invalidation failed");
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Invalidate board aggregates when a cache is configured
pub async fn invalidate(cache: Option<&RedisCache>) {
    if let Some(cache) = cache {
        cache.invalidate_board().await;
    }
}

/// Cache key builders. Keys include the board date so urgency rolls over
/// at midnight without an explicit flush.
pub mod keys {
    use chrono::NaiveDate;

    use crate::domain::BoardView;

    pub const BOARD_PATTERN: &str = "board:*";

    pub fn dashboard(view: BoardView, today: NaiveDate) -> String {
        format!("board:dashboard:{}:{}", view.as_str(), today)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn keys_fall_under_board_pattern() {
            let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
            assert_eq!(
                dashboard(BoardView::ApmActive, day),
                "board:dashboard:apm_active:2026-10-19"
            );
            assert!(dashboard(BoardView::Active, day).starts_with(BOARD_PATTERN.trim_end_matches('*')));
        }
    }
}
