//! services/api/src/adapters/cache.rs
//!
//! Redis-backed implementation of the `SharedCache` port, used as the second
//! tier of the geo cache when several service instances share place names.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use slideshow_core::ports::{PortError, PortResult, SharedCache};
use std::time::Duration;
use tracing::info;

/// Namespace for every key this service writes.
pub const KEY_PREFIX: &str = "slideshow:geo:";

fn prefixed_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

/// Redis rejects a zero expiry, so sub-second TTLs round up to one second.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn redis_error(err: redis::RedisError) -> PortError {
    PortError::Transport(format!("Redis: {}", err))
}

/// A `SharedCache` over a self-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisSharedCache {
    conn: ConnectionManager,
}

impl RedisSharedCache {
    /// Connects to the Redis server at `url` (e.g. `redis://cache:6379`).
    pub async fn connect(url: &str) -> PortResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| PortError::Unexpected(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client).await.map_err(redis_error)?;
        info!("Connected to the shared geo cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedCache for RedisSharedCache {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(prefixed_key(key))
            .await
            .map_err(redis_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> PortResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(prefixed_key(key), value, expiry_seconds(ttl))
            .await
            .map_err(redis_error)
    }
}
