/// Redis-backed payload cache
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client as RedisClient;
use tracing::debug;

use super::store::{CacheStore, Expiry};
use crate::error::{HistoryError, Result};

/// Redis cache over a multiplexed, auto-reconnecting connection.
///
/// `ConnectionManager` is cheap to clone; every call works on its own handle
/// so concurrent fetch tasks never serialize on a lock.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = RedisClient::open(redis_url)
            .map_err(|e| HistoryError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| HistoryError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        debug!("Connected to Redis at: {}", redis_url);

        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| HistoryError::Cache(format!("Redis GET failed: {}", e)))?;
        Ok(payload)
    }

    async fn set(&self, key: &str, payload: &str, expiry: Expiry) -> Result<()> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Expiry::At(at) = expiry {
            cmd.arg("EXAT").arg(at.timestamp());
        }

        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| HistoryError::Cache(format!("Redis SET failed: {}", e)))?;

        debug!("Cached {} ({:?})", key, expiry);
        Ok(())
    }
}
