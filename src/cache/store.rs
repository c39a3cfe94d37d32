/// Key/value store for raw upstream payloads
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

/// When a cached payload stops being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => now >= *at,
        }
    }
}

/// Cache interface shared by every backend.
///
/// Keys are canonical request URLs and values are raw upstream bodies.
/// Backend failures are returned, never swallowed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, payload: &str, expiry: Expiry) -> Result<()>;
}

/// Backend used when caching is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _payload: &str, _expiry: Expiry) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: String,
    pub expiry: Expiry,
}

/// Process-local cache with the same expiry semantics as Redis
#[derive(Debug, Default, Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect an entry, expired or not
    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.expiry.is_expired(now) => {
                    return Ok(Some(entry.payload.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.expiry.is_expired(now)) {
            entries.remove(key);
            debug!("Evicted expired cache entry {}", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, payload: &str, expiry: Expiry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.to_string(),
                expiry,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_noop_always_misses() {
        let cache = NoopCache;
        cache.set("k", "v", Expiry::Never).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_roundtrip_and_expiry() {
        let cache = InMemoryCache::new();
        cache.set("full", "a", Expiry::Never).await.unwrap();
        cache
            .set("stale", "b", Expiry::At(Utc::now() - Duration::seconds(1)))
            .await
            .unwrap();
        cache
            .set("fresh", "c", Expiry::At(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(cache.get("full").await.unwrap().as_deref(), Some("a"));
        assert_eq!(cache.get("stale").await.unwrap(), None);
        assert_eq!(cache.get("fresh").await.unwrap().as_deref(), Some("c"));
        assert!(cache.entry("stale").await.is_none());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = InMemoryCache::new();
        cache.set("k", "first", Expiry::Never).await.unwrap();
        cache.set("k", "second", Expiry::Never).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("second"));
    }
}
