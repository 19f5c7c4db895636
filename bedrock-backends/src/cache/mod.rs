//! Cache connector
//!
//! Builds a pooled Redis client from [`CacheSettings`], probes it with
//! `PING`, and wraps it in the [`RedisCache`] facade.
//!
//! Timeout mapping:
//!
//! - `pool_timeout` → wait for a free pooled connection
//! - `write_timeout` → create a new connection
//! - `read_timeout` → recycle check of a returned connection, and every
//!   read command (`PING`, `GET`, `EXISTS`)
//! - `write_timeout` also bounds every write command (`SET`, `DEL`)
//! - `idle_timeout` → connections unused this long are evicted

mod facade;
#[cfg(test)]
mod test_support;

use std::time::Duration;

use bedrock_core::CacheSettings;
use deadpool_redis::{Config, Metrics, Pool, PoolConfig, Runtime, Timeouts};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::CacheError;

pub use facade::RedisCache;

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

/// `redis://[:password@]addr/db`. An address that already carries a
/// `redis://` or `rediss://` scheme keeps it.
pub fn redis_url(settings: &CacheSettings) -> Result<String, CacheError> {
    let addr = settings.addr.trim();
    let (scheme, host) = match addr.split_once("://") {
        Some((scheme @ ("redis" | "rediss"), host)) => (scheme, host),
        Some((other, _)) => {
            return Err(CacheError::Url(format!("unsupported scheme '{other}'")));
        }
        None => ("redis", addr),
    };
    let host = host.trim_end_matches('/');
    if host.is_empty() {
        return Err(CacheError::Url("empty address".to_string()));
    }

    let auth = if settings.password.is_empty() {
        String::new()
    } else {
        format!(":{}@", urlencoding::encode(&settings.password))
    };

    Ok(format!("{scheme}://{auth}{host}/{}", settings.db))
}

fn pool_config(settings: &CacheSettings) -> PoolConfig {
    let mut timeouts = Timeouts::default();
    timeouts.wait = non_zero(settings.pool_timeout);
    timeouts.create = non_zero(settings.write_timeout);
    timeouts.recycle = non_zero(settings.read_timeout);

    let mut config = PoolConfig::new(settings.pool_size as usize);
    config.timeouts = timeouts;
    config
}

/// Create the pool without connecting.
pub fn create_pool(settings: &CacheSettings) -> Result<Pool, CacheError> {
    let mut config = Config::from_url(redis_url(settings)?);
    config.pool = Some(pool_config(settings));
    Ok(config.create_pool(Some(Runtime::Tokio1))?)
}

/// Whether a pooled connection survives an idle sweep.
fn is_fresh(metrics: &Metrics, idle_timeout: Duration) -> bool {
    metrics.last_used() < idle_timeout
}

fn spawn_idle_reaper(pool: Pool, idle_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(idle_timeout);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            let before = pool.status().size;
            pool.retain(|_, metrics| is_fresh(&metrics, idle_timeout));
            let evicted = before.saturating_sub(pool.status().size);
            if evicted > 0 {
                debug!(evicted, "evicted idle cache connections");
            }
        }
    })
}

fn command_facade(settings: &CacheSettings, pool: Pool) -> RedisCache {
    RedisCache::new(pool).with_timeouts(settings.read_timeout, settings.write_timeout)
}

#[derive(Debug)]
pub struct CacheConnector {
    settings: CacheSettings,
    cache: RedisCache,
    reaper: Option<JoinHandle<()>>,
}

impl CacheConnector {
    /// Build the pool, probe it, and start idle eviction.
    ///
    /// # Errors
    ///
    /// Any pool, checkout or probe failure.
    #[instrument(skip_all, fields(addr = %settings.addr, db = settings.db))]
    pub async fn construct(settings: CacheSettings) -> Result<Self, CacheError> {
        let pool = create_pool(&settings)?;
        let cache = command_facade(&settings, pool.clone());

        if let Err(e) = cache.ping().await {
            pool.close();
            return Err(e);
        }

        info!(pool_size = settings.pool_size, "cache ready");
        Ok(Self::with_reaper(settings, pool))
    }

    /// Connector over a probed pool, evicting idle connections when
    /// `idle_timeout` is non-zero.
    fn with_reaper(settings: CacheSettings, pool: Pool) -> Self {
        let reaper = non_zero(settings.idle_timeout)
            .map(|idle| spawn_idle_reaper(pool.clone(), idle));
        Self {
            cache: command_facade(&settings, pool),
            settings,
            reaper,
        }
    }

    /// Wrap an existing pool without probing it or reaping idle connections.
    pub fn from_pool(settings: CacheSettings, pool: Pool) -> Self {
        Self {
            cache: command_facade(&settings, pool),
            settings,
            reaper: None,
        }
    }

    pub fn client(&self) -> &Pool {
        self.cache.pool()
    }

    pub fn cache(&self) -> &RedisCache {
        &self.cache
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.cache.ping().await
    }

    /// Close the pool and stop idle eviction.
    pub fn close(&self) {
        if let Some(ref reaper) = self.reaper {
            reaper.abort();
        }
        self.cache.pool().close();
        info!("cache pool closed");
    }
}

impl Drop for CacheConnector {
    fn drop(&mut self) {
        if let Some(ref reaper) = self.reaper {
            reaper.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::cache::test_support::stalled_server;

    #[test]
    fn url_from_defaults() {
        let url = redis_url(&CacheSettings::default()).unwrap();
        assert_eq!(url, "redis://localhost:6379/0");
    }

    #[test]
    fn url_encodes_password_and_db() {
        let settings = CacheSettings {
            addr: "cache.internal:6380".to_string(),
            password: "p@ss/word".to_string(),
            db: 4,
            ..CacheSettings::default()
        };
        assert_eq!(
            redis_url(&settings).unwrap(),
            "redis://:p%40ss%2Fword@cache.internal:6380/4"
        );
    }

    #[test]
    fn url_keeps_tls_scheme_and_rejects_others() {
        let settings = CacheSettings {
            addr: "rediss://cache:6379/".to_string(),
            ..CacheSettings::default()
        };
        assert_eq!(redis_url(&settings).unwrap(), "rediss://cache:6379/0");

        let settings = CacheSettings {
            addr: "http://cache:6379".to_string(),
            ..CacheSettings::default()
        };
        assert!(matches!(redis_url(&settings), Err(CacheError::Url(_))));
    }

    #[test]
    fn pool_config_maps_timeouts() {
        let settings = CacheSettings {
            pool_size: 7,
            pool_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(3),
            read_timeout: Duration::ZERO,
            ..CacheSettings::default()
        };
        let config = pool_config(&settings);
        assert_eq!(config.max_size, 7);
        assert_eq!(config.timeouts.wait, Some(Duration::from_secs(2)));
        assert_eq!(config.timeouts.create, Some(Duration::from_secs(3)));
        assert_eq!(config.timeouts.recycle, None);
    }

    #[tokio::test]
    async fn lazy_pool_reports_configured_size() {
        let pool = create_pool(&CacheSettings::default()).unwrap();
        assert_eq!(pool.status().max_size, 10);
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    async fn unreachable_cache_fails_construction() {
        let settings = CacheSettings {
            addr: "127.0.0.1:1".to_string(),
            pool_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            ..CacheSettings::default()
        };
        assert!(CacheConnector::construct(settings).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires redis"]
    async fn construct_and_round_trip() {
        let settings = CacheSettings::from_source(&bedrock_core::Env);
        let connector = CacheConnector::construct(settings)
            .await
            .expect("construct failed");

        let cache = connector.cache();
        cache
            .set("bedrock:test:round_trip", &vec![1, 2, 3], Duration::from_secs(30))
            .await
            .expect("set failed");
        let value: Option<Vec<i32>> = cache.get("bedrock:test:round_trip").await.expect("get failed");
        assert_eq!(value, Some(vec![1, 2, 3]));

        connector.close();
    }

    #[test]
    fn idle_sweep_keeps_only_recently_used_connections() {
        let idle = Duration::from_secs(10);
        let now = Instant::now();

        let mut fresh = Metrics::default();
        fresh.created = now;
        assert!(is_fresh(&fresh, idle));

        let mut stale = Metrics::default();
        stale.created = now - Duration::from_secs(60);
        assert!(!is_fresh(&stale, idle));

        // recycling counts as use
        stale.recycled = Some(now);
        assert!(is_fresh(&stale, idle));
    }

    #[tokio::test]
    async fn stalled_server_cannot_block_construct() {
        let (addr, _server) = stalled_server().await;
        let settings = CacheSettings {
            addr,
            pool_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            ..CacheSettings::default()
        };

        let construct = CacheConnector::construct(settings);
        let outcome = tokio::time::timeout(Duration::from_secs(5), construct)
            .await
            .expect("construct blocked past its read timeout");
        assert!(matches!(
            outcome,
            Err(CacheError::Timeout { command: "PING", .. })
        ));
    }

    #[tokio::test]
    async fn connectors_bound_commands_by_settings() {
        let settings = CacheSettings {
            read_timeout: Duration::from_secs(4),
            write_timeout: Duration::ZERO,
            ..CacheSettings::default()
        };
        let pool = create_pool(&settings).unwrap();
        let connector = CacheConnector::from_pool(settings, pool);
        let cache = connector.cache();
        assert_eq!(cache.read_timeout(), Some(Duration::from_secs(4)));
        assert_eq!(cache.write_timeout(), None);
    }

    #[tokio::test]
    async fn reaper_evicts_idle_connections_until_closed() {
        let (addr, _server) = stalled_server().await;
        let settings = CacheSettings {
            addr,
            pool_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_millis(200),
            ..CacheSettings::default()
        };
        let pool = create_pool(&settings).unwrap();

        // handshake succeeds, so the connection is created and pooled
        drop(pool.get().await.unwrap());
        assert_eq!(pool.status().size, 1);

        let connector = CacheConnector::with_reaper(settings, pool.clone());
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(pool.status().size, 0);

        connector.close();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(connector.reaper.as_ref().unwrap().is_finished());
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn zero_idle_timeout_starts_no_reaper() {
        let settings = CacheSettings {
            idle_timeout: Duration::ZERO,
            ..CacheSettings::default()
        };
        let pool = create_pool(&settings).unwrap();
        let connector = CacheConnector::with_reaper(settings, pool);
        assert!(connector.reaper.is_none());
    }
}
