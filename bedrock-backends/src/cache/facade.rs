//! Typed cache facade over the Redis pool
//!
//! Values are stored as JSON. A zero TTL stores without expiry.
//!
//! Checkout is bounded by the pool's wait/create timeouts. Once a connection
//! is checked out, reads (`PING`, `GET`, `EXISTS`) are bounded by the read
//! timeout and writes (`SET`, `DEL`) by the write timeout.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use deadpool_redis::Pool;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::non_zero;
use crate::error::CacheError;

/// System-wide cache entry point. Cheap to clone.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisCache")
            .field("max_size", &status.max_size)
            .field("size", &status.size)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

/// Run one command, failing with [`CacheError::Timeout`] once `limit` elapses.
async fn bounded<T, F>(
    command: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout { command, limit }),
    }
}

/// PX argument for `ttl`. PX rejects zero, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl RedisCache {
    /// Facade without per-command limits.
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Bound reads by `read` and writes by `write`. Zero disables a limit.
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = non_zero(read);
        self.write_timeout = non_zero(write);
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let reply: String = bounded("PING", self.read_timeout, async {
            Ok::<String, CacheError>(redis::cmd("PING").query_async(&mut conn).await?)
        })
        .await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::UnexpectedPong(reply))
        }
    }

    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value)?;
        let millis = (!ttl.is_zero()).then(|| ttl_millis(ttl));
        let mut conn = self.pool.get().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Some(millis) = millis {
            cmd.arg("PX").arg(millis);
        }
        bounded("SET", self.write_timeout, async {
            let () = cmd.query_async(&mut conn).await?;
            Ok::<(), CacheError>(())
        })
        .await?;

        debug!(key, ttl_ms = ?millis, "cache set");
        Ok(())
    }

    /// `None` on a miss.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.pool.get().await?;
        let raw: Option<Vec<u8>> = bounded("GET", self.read_timeout, async {
            let raw: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok::<_, CacheError>(raw)
        })
        .await?;

        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => {
                debug!(key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let removed: u64 = bounded("DEL", self.write_timeout, async {
            Ok::<u64, CacheError>(redis::cmd("DEL").arg(key).query_async(&mut conn).await?)
        })
        .await?;
        Ok(removed > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let count: u64 = bounded("EXISTS", self.read_timeout, async {
            Ok::<u64, CacheError>(redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?)
        })
        .await?;
        Ok(count > 0)
    }

    /// Return the cached value, or compute it with `load`, store it, and
    /// return it. Loader errors are returned as-is and nothing is stored.
    pub async fn once<T, E, F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await? {
            return Ok(hit);
        }

        let value = load().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }
}
