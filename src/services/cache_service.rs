// src/services/cache_service.rs
use async_trait::async_trait;
use redis::Client;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::errors::DispatchError as AppError;

/// The TTL key/value store every negotiation token lives in. All
/// expirations are milliseconds. Besides plain get/set/delete it carries
/// two atomic compound primitives:
///
/// - `set_if_exists` writes only while the key is still present, which is
///   how a driver's acceptance is dropped once the offer has expired;
/// - `compare_and_delete` removes a key only while it still holds the
///   expected value, which is how a rider can only cancel their own
///   pending request.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl_ms: u64) -> Result<(), CacheError>;
    async fn set_if_exists(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, CacheError>;
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError>;
    async fn expire(&self, key: &str, ttl_ms: u64) -> Result<bool, CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Operation error: {0}")]
    OperationError(String),
}

impl From<CacheError> for AppError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::ConnectionError(msg) => AppError::RedisConnection(msg),
            CacheError::OperationError(msg) => AppError::RedisQuery(msg),
        }
    }
}

// Cache key generators for the negotiation state
pub struct CacheKeys;

impl CacheKeys {
    /// rider id -> the tracking id of their one pending request
    pub fn rider_connection(rider_id: &str) -> String {
        format!("rides:connection:{}", rider_id)
    }

    /// tracking/offer token -> "true" | "false"
    pub fn tracking(tracking_id: &str) -> String {
        format!("rides:tracking:{}", tracking_id)
    }
}

// Redis-backed store
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::Connection, CacheError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| CacheError::ConnectionError(e.to_string()))
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_ms: u64) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        Ok(())
    }

    async fn set_if_exists(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;
        // SET XX replies nil when the key is gone
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;
        let script = redis::Script::new(
            r#"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('DEL', KEYS[1])
            else
                return 0
            end
            "#,
        );
        let deleted: i64 = script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        Ok(deleted == 1)
    }

    async fn expire(&self, key: &str, ttl_ms: u64) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;
        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        Ok(updated == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::OperationError(e.to_string()))?;
        Ok(())
    }
}

// Memory store for development/testing
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn deadline(ttl_ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ttl_ms)
    }

    fn live<'a>(
        entries: &'a HashMap<String, (String, Instant)>,
        key: &str,
    ) -> Option<&'a (String, Instant)> {
        entries.get(key).filter(|(_, expires_at)| Instant::now() < *expires_at)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        Ok(Self::live(&entries, key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_ms: u64) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Self::deadline(ttl_ms)));
        Ok(())
    }

    async fn set_if_exists(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().await;
        if Self::live(&entries, key).is_none() {
            entries.remove(key);
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), Self::deadline(ttl_ms)));
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().await;
        let matches = Self::live(&entries, key).map(|(value, _)| value == expected).unwrap_or(false);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn expire(&self, key: &str, ttl_ms: u64) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().await;
        let deadline = Self::deadline(ttl_ms);
        match entries.get_mut(key) {
            Some((_, expires_at)) if Instant::now() < *expires_at => {
                *expires_at = deadline;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
