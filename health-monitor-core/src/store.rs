//! # TTL Store
//!
//! A keyed store supporting atomic set-if-absent and TTL-scoped get/set,
//! used by both the Worker Lease (`health_check_lock:{provider}:{model}:{gateway}`)
//! and the Cache Publisher (the four published documents). Two
//! implementations are provided: `RedisTtlStore` for production and
//! `InMemoryTtlStore` as the coordination fallback and the implementation
//! used by tests that don't stand up a Redis instance.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Errors from a TTL store operation. Callers treat every variant as
/// transient — §7 "Coordination errors … degrade to no-op" applies
/// uniformly regardless of the underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("ttl store error: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A keyed store with TTL semantics and an atomic set-if-absent primitive.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrites `key` unconditionally with `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Sets `key` only if it does not already exist, atomically. Returns
    /// `true` if this call acquired the key, `false` if it was already
    /// held. This is the primitive the Worker Lease needs — the teacher's
    /// cache manager never implements it, since a response cache never
    /// needs mutual exclusion.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Removes `key`, if present.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    created_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// In-memory fallback store, backing both degraded-mode lease acquisition
/// and `InMemoryTrackingStore`-style tests. Mirrors the teacher's
/// `CacheEntry`/`is_expired` shape, generalized from `serde_json::Value`
/// payloads to plain strings (every lease token and cache document is
/// serialized to a string before it reaches the store layer).
#[derive(Debug, Default)]
pub struct InMemoryTtlStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryTtlStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl TtlStore for InMemoryTtlStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        if let Some(existing) = self.entries.get(key) {
            if !existing.is_expired() {
                return Ok(false);
            }
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed store for production coordination and cache publication.
/// Opens a fresh multiplexed connection per operation, matching the
/// teacher's `gateway_caching::CacheManager`.
pub struct RedisTtlStore {
    client: redis::Client,
}

impl RedisTtlStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::new(format!("failed to open redis client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| StoreError::new(format!("failed to open redis connection: {e}")))
    }
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::new(format!("redis GET error: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs() as i64)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::new(format!("redis SETEX error: {e}")))?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs() as i64)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::new(format!("redis SET NX error: {e}")))?;
        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::new(format!("redis DEL error: {e}")))?;
        Ok(())
    }
}

/// Shared handle used by components that only ever need read/write access,
/// never ownership (the Cache Publisher and Worker Lease both hold one).
pub type SharedTtlStore = Arc<dyn TtlStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_only_succeeds_once_while_the_lease_is_held() {
        let store = InMemoryTtlStore::new();
        let first = store
            .set_if_absent("health_check_lock:openai:gpt-4o:openrouter", "worker-1", Duration::from_secs(60))
            .await
            .unwrap();
        let second = store
            .set_if_absent("health_check_lock:openai:gpt-4o:openrouter", "worker-2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn expired_entries_can_be_reacquired() {
        let store = InMemoryTtlStore::new();
        store
            .set_if_absent("k", "v1", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let reacquired = store.set_if_absent("k", "v2", Duration::from_secs(60)).await.unwrap();
        assert!(reacquired);
    }

    #[tokio::test]
    async fn get_returns_none_after_expiry() {
        let store = InMemoryTtlStore::new();
        store.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_the_key() {
        let store = InMemoryTtlStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
