//! Idempotence store — keeps a "handled" record per idempotence key.
//!
//! Presence of a record means the notification was sent (or is being sent by
//! a concurrent delivery that holds the claim). Records carry a TTL after
//! which the key becomes eligible for reprocessing.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use courier_common::error::DispatchError;

/// Key-value capability backing idempotence records.
#[async_trait]
pub trait IdempotenceStore: Send + Sync {
    /// Whether a truthy record exists for the key.
    async fn get(&self, key: &str) -> Result<bool, DispatchError>;

    /// Write a record unconditionally.
    async fn set(&self, key: &str, value: bool, ttl: Duration) -> Result<(), DispatchError>;

    /// Atomically write a truthy record if no record exists. Returns `true`
    /// if the record was written, `false` if the key was already claimed.
    /// This is the only synchronization point between concurrent deliveries
    /// of the same key.
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, DispatchError>;

    /// Delete the record, releasing the key for reprocessing.
    async fn remove(&self, key: &str) -> Result<(), DispatchError>;
}

/// Redis-backed idempotence store using `SET NX EX` for the atomic claim.
#[derive(Clone)]
pub struct RedisIdempotenceStore {
    redis: ConnectionManager,
}

impl RedisIdempotenceStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn record_key(key: &str) -> String {
        format!("notification:handled:{}", key)
    }

    /// Redis rejects EX 0; clamp sub-second TTLs to one second.
    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl IdempotenceStore for RedisIdempotenceStore {
    async fn get(&self, key: &str) -> Result<bool, DispatchError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn
            .get(Self::record_key(key))
            .await
            .map_err(|e| DispatchError::Store(e.to_string()))?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn set(&self, key: &str, value: bool, ttl: Duration) -> Result<(), DispatchError> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(
            Self::record_key(key),
            if value { "1" } else { "0" },
            Self::ttl_seconds(ttl),
        )
        .await
        .map_err(|e| DispatchError::Store(e.to_string()))?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, DispatchError> {
        let mut conn = self.redis.clone();

        // SET key "1" NX EX ttl
        // Returns Some("OK") if the key was set (claim acquired)
        // Returns None if the key already exists (claim held elsewhere)
        let result: Option<String> = redis::cmd("SET")
            .arg(Self::record_key(key))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| DispatchError::Store(e.to_string()))?;

        Ok(result.is_some())
    }

    async fn remove(&self, key: &str) -> Result<(), DispatchError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(Self::record_key(key))
            .await
            .map_err(|e| DispatchError::Store(e.to_string()))?;
        Ok(())
    }
}
