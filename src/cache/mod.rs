//! Key/value storage behind the permission cache.

pub mod permission_cache;
pub mod store;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use thiserror::Error;
use tracing::info;

use crate::config::RedisConfig;

pub use permission_cache::{BoardPermissions, PermissionCache};
pub use store::{MemoryKvStore, RedisKvStore};

pub fn create_redis_pool(config: &RedisConfig) -> Option<Pool> {
    let url = config.url.as_ref()?;

    let timeout = std::time::Duration::from_secs(config.connection_timeout_secs);
    let cfg = RedisPoolConfig::from_url(url);
    let pool = cfg.builder().ok().and_then(|b| {
        b.max_size(config.pool_size)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .ok()
    });

    if pool.is_some() {
        info!(redis_url = %url.split('@').next_back().unwrap_or("***"), "Redis pool created");
    }

    pool
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Redis not configured")]
    NoRedis,
    #[error("Redis connection failed")]
    ConnectionFailed,
    #[error("Redis operation failed")]
    OperationFailed,
    #[error("Serialization failed")]
    Serialization,
    #[error("cache entry {key} changed concurrently {attempts} times")]
    ContentionExhausted { key: String, attempts: u32 },
}

/// A string key/value store with no expiry.
///
/// `compare_and_swap` writes `new` only when the stored value equals
/// `expected` (`None` meaning the key is absent) and reports whether it did.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, CacheError>;

    fn backend(&self) -> &'static str;
}
