//! Ephemeral key-value storage with per-key expiry.
//!
//! [`EphemeralStore`] is the seam services program against. [`RedisStore`]
//! is the production implementation; [`MemoryStore`] keeps the same TTL
//! semantics in process and is driven by the tokio clock, so tests can
//! advance time deterministically.

use crate::{with_timeout, SharedConnectionManager};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// GET/SET/DELETE/EXISTS with a TTL on every write.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditional write; replaces any existing value and TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Write only if the key is absent. Returns `true` when this call created it.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Returns `true` when a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    redis: SharedConnectionManager,
}

impl RedisStore {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    // EX rejects 0
    ttl.as_secs().max(1)
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.lock().await.clone();
        let value = with_timeout(async {
            redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await.clone();
        with_timeout(async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs(ttl))
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await?;
        debug!(key, ttl_secs = ttl_secs(ttl), "ephemeral key written");
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.redis.lock().await.clone();
        // SET ... NX replies OK when written and nil when the key already exists
        let reply = with_timeout(async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs(ttl))
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.lock().await.clone();
        let removed = with_timeout(async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<_, i64>(&mut conn)
                .await
        })
        .await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.lock().await.clone();
        let count = with_timeout(async {
            redis::cmd("EXISTS")
                .arg(key)
                .query_async::<_, i64>(&mut conn)
                .await
        })
        .await?;
        Ok(count > 0)
    }
}

/// In-process store with lazy expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.1 > now => return Some(entry.0.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, (_, deadline)| *deadline <= now);
        }
        None
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.live_value(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| (String::new(), now));
        if entry.1 > now {
            return Ok(false);
        }
        *entry = (value.to_string(), now + ttl);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, (_, deadline))| deadline > now)
            .unwrap_or(false))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_value(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_expires_keys() {
        let store = MemoryStore::new();
        store
            .set_ex("verify:email:a@x.com", "482913", Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(
            store.get("verify:email:a@x.com").await.unwrap().as_deref(),
            Some("482913")
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("verify:email:a@x.com").await.unwrap().is_none());
        assert!(!store.exists("verify:email:a@x.com").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_nx_only_writes_absent_or_expired_keys() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(10);

        assert!(store.set_nx_ex("k", "first", ttl).await.unwrap());
        assert!(!store.set_nx_ex("k", "second", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.set_nx_ex("k", "third", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_live_key_existed() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }

    #[test]
    fn test_ttl_is_never_zero_on_the_wire() {
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
    }
}
