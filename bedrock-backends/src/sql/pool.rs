//! PostgreSQL pool construction
//!
//! Maps [`SqlSettings`] onto sqlx options:
//!
//! - `timeout` → pool acquire timeout
//! - `dial_timeout` → bound on establishing the first connection
//! - `read_timeout` → server-side `statement_timeout`
//! - `write_timeout` → server-side `lock_timeout`
//! - `max_open_conns` → `max_connections`
//!
//! A zero dial, read or write timeout disables that limit.

use bedrock_core::{SqlSettings, TlsMode};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::debug;

use crate::error::SqlError;

fn ssl_mode(mode: TlsMode) -> PgSslMode {
    match mode {
        TlsMode::Disable => PgSslMode::Disable,
        TlsMode::Prefer => PgSslMode::Prefer,
        TlsMode::Require => PgSslMode::Require,
        TlsMode::VerifyCa => PgSslMode::VerifyCa,
        TlsMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Connection options for a single connection.
pub fn connect_options(settings: &SqlSettings) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.username)
        .password(&settings.password)
        .database(&settings.database)
        .ssl_mode(ssl_mode(settings.tls_mode))
        .options([
            ("statement_timeout", settings.read_timeout.as_millis()),
            ("lock_timeout", settings.write_timeout.as_millis()),
        ]);

    if let Some(ref ca) = settings.tls_root_cert {
        options = options.ssl_root_cert(ca);
    }

    options
}

/// Pool options carrying the clamped pool limits.
pub fn pool_options(settings: &SqlSettings) -> PgPoolOptions {
    let limits = settings.pool_limits();
    debug!(
        max_open = limits.max_open,
        max_idle = limits.max_idle,
        "relational store pool limits"
    );

    let options = PgPoolOptions::new()
        .max_connections(limits.max_open)
        .min_connections(0)
        .test_before_acquire(true);

    // sqlx requires a finite acquire timeout; keep its default for zero
    if settings.timeout.is_zero() {
        options
    } else {
        options.acquire_timeout(settings.timeout)
    }
}

/// Create a pool and establish its first connection.
///
/// # Errors
///
/// Returns [`SqlError::DialTimeout`] if no connection is established within
/// the dial timeout, or [`SqlError::Connect`] on transport/auth failure.
pub async fn create_pool(settings: &SqlSettings) -> Result<PgPool, SqlError> {
    let connect = pool_options(settings).connect_with(connect_options(settings));

    if settings.dial_timeout.is_zero() {
        return connect.await.map_err(SqlError::Connect);
    }

    match tokio::time::timeout(settings.dial_timeout, connect).await {
        Ok(result) => result.map_err(SqlError::Connect),
        Err(_) => Err(SqlError::DialTimeout(settings.dial_timeout)),
    }
}

/// Create a pool without connecting. Connections open on first use.
pub fn create_lazy_pool(settings: &SqlSettings) -> PgPool {
    pool_options(settings).connect_lazy_with(connect_options(settings))
}
