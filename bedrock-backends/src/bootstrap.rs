//! Startup sequencing
//!
//! Resolves settings, constructs the relational store, search engine and
//! cache connectors in that order, and applies each backend's
//! [`Requirement`]: a required backend that fails aborts startup, an
//! optional one is logged and left empty.

use bedrock_core::{CacheSettings, ConfigSource, Requirement, SearchSettings, SqlSettings};
use tracing::{error, info, warn};

use crate::cache::CacheConnector;
use crate::error::{BackendKind, Result};
use crate::registry::{Backends, BackendsInner};
use crate::search::SearchClient;
use crate::sql::SqlConnector;

async fn connect_sql(settings: SqlSettings) -> Result<SqlConnector> {
    settings.validate()?;
    Ok(SqlConnector::construct(settings).await?)
}

fn connect_search(settings: SearchSettings) -> Result<SearchClient> {
    Ok(SearchClient::new(settings)?)
}

async fn connect_cache(settings: CacheSettings) -> Result<CacheConnector> {
    settings.validate()?;
    Ok(CacheConnector::construct(settings).await?)
}

/// Turn a connector result into a registry slot according to `requirement`.
fn admit<T>(kind: BackendKind, requirement: Requirement, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(connector) => Ok(Some(connector)),
        Err(e) if requirement == Requirement::Optional => {
            warn!(backend = %kind, error = %e, "optional backend unavailable, continuing");
            Ok(None)
        }
        Err(e) => {
            error!(backend = %kind, error = %e, "required backend failed");
            Err(e)
        }
    }
}

async fn fill(inner: &mut BackendsInner, source: &(impl ConfigSource + ?Sized)) -> Result<()> {
    let sql = SqlSettings::from_source(source);
    let requirement = sql.requirement;
    inner.sql = admit(BackendKind::Sql, requirement, connect_sql(sql).await)?;

    let search = SearchSettings::from_source(source);
    let requirement = search.requirement;
    inner.search = admit(BackendKind::Search, requirement, connect_search(search))?;

    let cache = CacheSettings::from_source(source);
    let requirement = cache.requirement;
    inner.cache = admit(BackendKind::Cache, requirement, connect_cache(cache).await)?;

    Ok(())
}

/// Provision every backend from `source`.
///
/// On a required backend's failure, backends already connected are closed
/// before the error is returned.
pub async fn provision(source: &(impl ConfigSource + ?Sized)) -> Result<Backends> {
    let mut inner = BackendsInner::default();

    if let Err(e) = fill(&mut inner, source).await {
        inner.close().await;
        return Err(e);
    }

    let backends = Backends::from_inner(inner);
    info!(
        sql = backends.is_available(BackendKind::Sql),
        search = backends.is_available(BackendKind::Search),
        cache = backends.is_available(BackendKind::Cache),
        "backends provisioned"
    );
    Ok(backends)
}
