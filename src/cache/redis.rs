//! Distributed tier backed by Redis.
//!
//! Values are stored as raw image bytes under `<key_prefix><hex>.<ext>`,
//! always written with `SETEX` so every entry expires.

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{CacheKey, CacheTier, Tier};
use crate::error::CacheTierError;

/// Default entry TTL: 24 hours
pub const DEFAULT_REDIS_TTL_SECS: u64 = 24 * 60 * 60;

/// Redis-backed distributed cache.
///
/// Holds a [`ConnectionManager`], which multiplexes requests over one
/// connection and reconnects on failure. Cloning the manager per call is
/// cheap.
pub struct RedisCache {
    connection: ConnectionManager,
    key_prefix: String,
    ttl_secs: u64,
}

impl RedisCache {
    /// Connect to Redis at `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheTierError::Connection`] if the URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(
        redis_url: &str,
        key_prefix: impl Into<String>,
        ttl_secs: u64,
    ) -> Result<Self, CacheTierError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheTierError::Connection(format!("Invalid Redis URL: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheTierError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
            ttl_secs,
        })
    }

    /// Send `PING` and expect `PONG`.
    pub async fn ping(&self) -> Result<(), CacheTierError> {
        let mut conn = self.connection.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(CacheTierError::Redis(format!("Unexpected PING reply: {}", reply)))
        }
    }

    /// TTL applied to every write.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn redis_key(&self, key: &CacheKey) -> String {
        key.object_key(&self.key_prefix)
    }
}

fn redis_error(e: redis::RedisError) -> CacheTierError {
    CacheTierError::Redis(e.to_string())
}

#[async_trait]
impl CacheTier for RedisCache {
    fn tier(&self) -> Tier {
        Tier::Distributed
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheTierError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(self.redis_key(key)).await.map_err(redis_error)?;
        Ok(value.map(Bytes::from))
    }

    async fn put(
        &self,
        key: &CacheKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), CacheTierError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(self.redis_key(key), data.as_ref(), self.ttl_secs)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}
