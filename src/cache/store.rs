//! `KvStore` backends: Redis for deployments, an in-process map otherwise.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, Script};
use tracing::{debug, error};

use super::{CacheError, KvStore};

// GET-compare-SET executed atomically on the server. An empty ARGV[1] with
// ARGV[3] == "0" means "expect the key to be absent".
const CAS_SCRIPT: &str = r#"
local current = redis.call("GET", KEYS[1])
if ARGV[3] == "0" then
    if current then
        return 0
    end
elseif current ~= ARGV[1] then
    return 0
end
redis.call("SET", KEYS[1], ARGV[2])
return 1
"#;

#[derive(Clone)]
pub struct RedisKvStore {
    pool: Pool,
    cas: Script,
}

impl RedisKvStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            cas: Script::new(CAS_SCRIPT),
        }
    }

    async fn conn(&self) -> Result<Connection, CacheError> {
        self.pool.get().await.map_err(|e| {
            error!(error = %e, "Failed to get Redis connection");
            CacheError::ConnectionFailed
        })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(|e| {
            error!(error = %e, key = %key, "Failed to read cache entry");
            CacheError::OperationFailed
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            error!(error = %e, key = %key, "Failed to write cache entry");
            CacheError::OperationFailed
        })
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await.map_err(|e| {
            error!(error = %e, key = %key, "Failed to delete cache entry");
            CacheError::OperationFailed
        })
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let swapped: i32 = self
            .cas
            .key(key)
            .arg(expected.unwrap_or(""))
            .arg(new)
            .arg(if expected.is_some() { "1" } else { "0" })
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "Cache compare-and-swap failed");
                CacheError::OperationFailed
            })?;

        debug!(key = %key, swapped = swapped == 1, "Cache compare-and-swap");
        Ok(swapped == 1)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Process-local store. Entries live as long as the process.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, CacheError> {
        match (self.entries.entry(key.to_string()), expected) {
            (Entry::Vacant(slot), None) => {
                slot.insert(new.to_string());
                Ok(true)
            }
            (Entry::Occupied(mut slot), Some(expected)) if slot.get() == expected => {
                slot.insert(new.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_set_delete() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("boards:1").await.unwrap(), None);

        store.set("boards:1", "{}").await.unwrap();
        assert_eq!(store.get("boards:1").await.unwrap().as_deref(), Some("{}"));

        store.delete("boards:1").await.unwrap();
        assert_eq!(store.get("boards:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_compare_and_swap() {
        let store = MemoryKvStore::new();

        assert!(store.compare_and_swap("k", None, "a").await.unwrap());
        assert!(!store.compare_and_swap("k", None, "b").await.unwrap());
        assert!(!store.compare_and_swap("k", Some("x"), "b").await.unwrap());
        assert!(store.compare_and_swap("k", Some("a"), "b").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
    }
}
