//! Read-through cache of each user's permission names.
//!
//! Entries are a JSON snapshot of the full set, written with a TTL. Any grant
//! or revoke drops the entry, so a stale snapshot lives at most `ttl_secs`
//! when an invalidation is lost. Without a Redis pool every lookup misses.

use std::collections::BTreeSet;

use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

const KEY_PREFIX: &str = "pawtrack:perms:v1:";
const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("redis is not configured")]
    Disabled,
    #[error("redis unavailable: {0}")]
    Unavailable(String),
    #[error("redis command failed: {0}")]
    Command(String),
    #[error("cache entry could not be encoded: {0}")]
    Encoding(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Command(e.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    permissions: BTreeSet<String>,
    cached_at: i64,
}

#[derive(Clone)]
pub struct PermissionCache {
    pool: Option<Pool>,
    ttl_secs: u64,
}

impl PermissionCache {
    pub fn new(pool: Option<Pool>) -> Self {
        Self::with_ttl(pool, DEFAULT_TTL_SECS)
    }

    pub fn with_ttl(pool: Option<Pool>, ttl_secs: u64) -> Self {
        Self {
            pool,
            ttl_secs: ttl_secs.max(1),
        }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    fn key(user_id: Uuid) -> String {
        format!("{KEY_PREFIX}{user_id}")
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        let pool = self.pool.as_ref().ok_or(CacheError::Disabled)?;
        pool.get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    /// Cached permission names, or `None` on a miss or any Redis trouble.
    pub async fn get(&self, user_id: Uuid) -> Option<BTreeSet<String>> {
        if !self.is_available() {
            return None;
        }
        let mut conn = self.connection().await.ok()?;
        let raw: Option<String> = match conn.get(Self::key(user_id)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Permission cache read failed");
                return None;
            }
        };

        let snapshot: Snapshot = serde_json::from_str(&raw?)
            .inspect_err(|e| {
                debug!(user_id = %user_id, error = %e, "Discarding unreadable cache entry")
            })
            .ok()?;
        Some(snapshot.permissions)
    }

    pub async fn set(
        &self,
        user_id: Uuid,
        permissions: BTreeSet<String>,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let snapshot = Snapshot {
            permissions,
            cached_at: chrono::Utc::now().timestamp(),
        };
        let value =
            serde_json::to_string(&snapshot).map_err(|e| CacheError::Encoding(e.to_string()))?;

        let _: () = conn.set_ex(Self::key(user_id), value, self.ttl_secs).await?;
        let count = snapshot.permissions.len();
        debug!(user_id = %user_id, count, "Permission snapshot cached");
        Ok(())
    }

    pub async fn invalidate(&self, user_id: Uuid) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let removed: u32 = conn.del(Self::key(user_id)).await?;
        debug!(user_id = %user_id, removed, "Permission snapshot dropped");
        Ok(())
    }
}
