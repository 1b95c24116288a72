//! Key-value store capability supplied by the hosting environment.
//!
//! The store is minimal: `get` and `put` of opaque bytes by
//! string key. Callers own the encoding and any freshness policy.
//!
//! Two implementations are provided:
//! - [`MemoryKvStore`] - process-local, used by default and in tests
//! - [`RedisKvStore`] - shared across instances
//!
//! # Usage
//!
//! ```rust,ignore
//! let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
//! store.put("jwks", bytes).await?;
//! let cached = store.get("jwks").await?;
//! ```

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by a key-value store.
#[derive(Error, Debug)]
pub enum KvError {
    /// The store could not be opened or reached.
    #[error("Key-value store unavailable: {0}")]
    Unavailable(String),

    /// A read or write against the store failed.
    #[error("Key-value operation failed: {0}")]
    Operation(String),
}

/// Opaque byte store keyed by string.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError>;
}

/// Process-local key-value store.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Redis-backed key-value store.
///
/// Cheaply cloneable: the multiplexed connection is shared across tasks.
#[derive(Clone)]
pub struct RedisKvStore {
    connection: MultiplexedConnection,
}

impl RedisKvStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Unavailable` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, KvError> {
        // Do NOT log redis_url, it may carry credentials
        let client = Client::open(redis_url).map_err(|e| {
            tracing::error!(target: "common.kv", error = %e, "Failed to open Redis client");
            KvError::Unavailable(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::error!(target: "common.kv", error = %e, "Failed to connect to Redis");
                KvError::Unavailable(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<Vec<u8>>>(key).await.map_err(|e| {
            tracing::warn!(target: "common.kv", error = %e, key = %key, "Redis GET failed");
            KvError::Operation(format!("GET failed: {e}"))
        })
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            tracing::warn!(target: "common.kv", error = %e, key = %key, "Redis SET failed");
            KvError::Operation(format!("SET failed: {e}"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_absent() {
        let store = MemoryKvStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_put_then_get() {
        let store = MemoryKvStore::new();
        store.put("k", b"v1".to_vec()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_put_overwrites() {
        let store = MemoryKvStore::new();
        store.put("k", b"old".to_vec()).await.unwrap();
        store.put("k", b"new".to_vec()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_entries() {
        let store = MemoryKvStore::new();
        let clone = store.clone();
        clone.put("shared", b"x".to_vec()).await.unwrap();

        assert_eq!(store.get("shared").await.unwrap(), Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_store_as_trait_object() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        store.put("k", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_redis_store_rejects_invalid_url() {
        let result = RedisKvStore::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(KvError::Unavailable(_))));
    }
}
