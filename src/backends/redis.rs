//! Redis cache backend
//!
//! A thin pass-through over a multiplexed `redis` connection. Keys that do not
//! exist are reported as `None` / `false`, never as errors.

use crate::core::{
    config::CacheConfig,
    error::{DatabaseError, Result},
};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::Mutex;

/// Key/value cache operations
#[async_trait]
pub trait CacheDb: Send + Sync {
    /// Store `value` without expiry
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Store `value` expiring after `ttl`; a zero `ttl` means no expiry
    async fn set_exp(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Value stored at `key`, `None` when missing
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[&str]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Increment by one, returning the new value
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Increment by `delta`, returning the new value
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Fails unless the server answers `PONG`
    async fn ping(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// [`CacheDb`] over a single multiplexed connection
pub struct RedisClient {
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisClient {
    /// Connect to the server described by `config`
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let client = redis::Client::open(config.url())?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::debug!(host = %config.host, port = config.port, "redis connection ready");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// A handle to the shared connection
    async fn conn(&self) -> Result<MultiplexedConnection> {
        self.conn
            .lock()
            .await
            .clone()
            .ok_or_else(|| DatabaseError::config("cache connection is closed"))
    }
}

#[async_trait]
impl CacheDb for RedisClient {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_exp(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return self.set(key, value).await;
        }
        let millis = u64::try_from(ttl.as_millis())
            .map_err(|_| DatabaseError::config("expiration out of range"))?;
        let mut conn = self.conn().await?;
        conn.pset_ex::<_, _, ()>(key, value, millis).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.del(keys).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.incr(key, delta).await?)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(DatabaseError::UnexpectedReply(reply));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.conn.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> Option<CacheConfig> {
        let host = std::env::var("REDIS_HOST").ok()?;
        let port = std::env::var("REDIS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(6379);
        Some(CacheConfig {
            host,
            port,
            password: std::env::var("REDIS_PASSWORD").ok(),
        })
    }

    #[tokio::test]
    async fn test_connect_validates_config() {
        let config = CacheConfig {
            host: String::new(),
            port: 6379,
            password: None,
        };
        assert!(matches!(
            RedisClient::connect(&config).await,
            Err(DatabaseError::Config(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Run with: REDIS_HOST=localhost cargo test --features redis_support -- --ignored
    async fn test_redis_round_trip() -> Result<()> {
        let Some(config) = live_config() else {
            eprintln!("Skipping test: REDIS_HOST not set");
            return Ok(());
        };
        let cache = RedisClient::connect(&config).await?;
        cache.ping().await?;

        let key = format!("gobit:test:{}", std::process::id());
        cache.delete(&[&key]).await?;
        assert_eq!(cache.get(&key).await?, None);
        assert!(!cache.exists(&key).await?);

        cache.set(&key, "41").await?;
        assert_eq!(cache.get(&key).await?.as_deref(), Some("41"));
        assert_eq!(cache.incr(&key).await?, 42);
        assert_eq!(cache.incr_by(&key, 8).await?, 50);

        assert_eq!(cache.delete(&[&key]).await?, 1);
        assert_eq!(cache.delete(&[&key]).await?, 0);

        cache.set_exp(&key, "v", Duration::from_millis(50)).await?;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get(&key).await?, None);

        cache.close().await?;
        assert!(matches!(cache.ping().await, Err(DatabaseError::Config(_))));
        Ok(())
    }
}
