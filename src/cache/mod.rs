//! Optional Redis layer. Every consumer works without it.

pub mod permission_cache;

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{Config as PoolConfig, Pool, PoolConfig as PoolSizing, Runtime, Timeouts};
use tracing::{info, warn};

use crate::config::RedisConfig;

pub use permission_cache::{CacheError, PermissionCache};

/// Builds the pool when `REDIS_URL` is configured. A malformed URL is logged
/// and treated as "no Redis". Connections are opened lazily.
pub fn create_redis_pool(config: &RedisConfig) -> Option<Pool> {
    let url = config.url.as_deref()?;
    let timeout = Some(Duration::from_secs(config.connection_timeout_secs));

    let mut pool_config = PoolConfig::from_url(url);
    pool_config.pool = Some(PoolSizing {
        max_size: config.pool_size,
        timeouts: Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        },
        ..PoolSizing::default()
    });

    match pool_config.create_pool(Some(Runtime::Tokio1)) {
        Ok(pool) => {
            let host = url.rsplit('@').next().unwrap_or("***");
            info!(redis = %host, max_size = config.pool_size, "Redis pool configured");
            Some(pool)
        }
        Err(e) => {
            warn!(error = %e, "Redis disabled: pool could not be built");
            None
        }
    }
}

#[derive(Clone)]
pub struct CacheServices {
    pub redis_pool: Option<Pool>,
    pub permission_cache: Arc<PermissionCache>,
}

impl CacheServices {
    pub fn new(redis_pool: Option<Pool>, permission_ttl_secs: u64) -> Self {
        let permission_cache = PermissionCache::with_ttl(redis_pool.clone(), permission_ttl_secs);
        Self {
            redis_pool,
            permission_cache: Arc::new(permission_cache),
        }
    }
}
