//! Provisioned backends shared across the service
//!
//! Built once by [`crate::provision`] and handed to consumers by clone. The
//! value only exists after every connector has been constructed, so no
//! reader can see a half-initialized registry.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::cache::{CacheConnector, RedisCache};
use crate::error::{BackendError, BackendKind, Result};
use crate::search::SearchClient;
use crate::sql::SqlConnector;

/// Shared backend handles
#[derive(Debug, Clone)]
pub struct Backends {
    inner: Arc<BackendsInner>,
}

#[derive(Debug, Default)]
pub(crate) struct BackendsInner {
    pub(crate) sql: Option<SqlConnector>,
    pub(crate) search: Option<SearchClient>,
    pub(crate) cache: Option<CacheConnector>,
}

impl BackendsInner {
    pub(crate) async fn close(&self) {
        if let Some(ref sql) = self.sql {
            sql.close().await;
        }
        if let Some(ref cache) = self.cache {
            cache.close();
        }
    }
}

impl Backends {
    /// Assemble a registry from already constructed connectors. An empty
    /// slot reads as [`BackendError::Unavailable`].
    pub fn new(
        sql: Option<SqlConnector>,
        search: Option<SearchClient>,
        cache: Option<CacheConnector>,
    ) -> Self {
        Self::from_inner(BackendsInner { sql, search, cache })
    }

    pub(crate) fn from_inner(inner: BackendsInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn sql(&self) -> Result<&SqlConnector> {
        self.inner
            .sql
            .as_ref()
            .ok_or(BackendError::Unavailable(BackendKind::Sql))
    }

    /// Shorthand for `sql()?.handle()`.
    pub fn pool(&self) -> Result<&PgPool> {
        self.sql().map(SqlConnector::handle)
    }

    pub fn search(&self) -> Result<&SearchClient> {
        self.inner
            .search
            .as_ref()
            .ok_or(BackendError::Unavailable(BackendKind::Search))
    }

    pub fn cache_connector(&self) -> Result<&CacheConnector> {
        self.inner
            .cache
            .as_ref()
            .ok_or(BackendError::Unavailable(BackendKind::Cache))
    }

    /// The cache facade.
    pub fn cache(&self) -> Result<&RedisCache> {
        self.cache_connector().map(CacheConnector::cache)
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Sql => self.inner.sql.is_some(),
            BackendKind::Search => self.inner.search.is_some(),
            BackendKind::Cache => self.inner.cache.is_some(),
        }
    }

    /// Close the pooled backends. Handles stay readable but stop serving.
    pub async fn close(&self) {
        self.inner.close().await;
        info!("backends closed");
    }
}
