//! Relational store connector
//!
//! A [`SqlConnector`] only exists once its pool has connected and answered
//! a liveness probe, so holding one means the handle is usable.

pub mod pool;

use bedrock_core::{PoolLimits, SqlSettings};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::SqlError;

pub use pool::{connect_options, create_lazy_pool, create_pool, pool_options};

#[derive(Debug, Clone)]
pub struct SqlConnector {
    settings: SqlSettings,
    pool: PgPool,
}

impl SqlConnector {
    /// Connect, then probe the connection with `SELECT 1`.
    ///
    /// # Errors
    ///
    /// Any connect or probe failure, with its cause preserved.
    #[instrument(skip_all, fields(addr = %settings.address(), db = %settings.database))]
    pub async fn construct(settings: SqlSettings) -> Result<Self, SqlError> {
        let pool = create_pool(&settings).await?;
        let connector = Self { settings, pool };

        if let Err(e) = connector.ping().await {
            connector.pool.close().await;
            return Err(e);
        }

        info!(
            tls = %connector.settings.tls_mode,
            max_open = connector.settings.max_open_conns,
            "relational store ready"
        );
        Ok(connector)
    }

    /// Wrap an existing pool without probing it.
    pub fn from_pool(settings: SqlSettings, pool: PgPool) -> Self {
        Self { settings, pool }
    }

    pub fn handle(&self) -> &PgPool {
        &self.pool
    }

    pub fn settings(&self) -> &SqlSettings {
        &self.settings
    }

    pub fn limits(&self) -> PoolLimits {
        self.settings.pool_limits()
    }

    /// Liveness probe.
    pub async fn ping(&self) -> Result<(), SqlError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(SqlError::Ping)
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("relational store pool closed");
    }
}
