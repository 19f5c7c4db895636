//! Connection settings for each backend
//!
//! Records are resolved once at startup from a [`ConfigSource`] and are not
//! mutated afterward. Durations and pool sizes are unsigned by type, so the
//! only invariants left to check are the cross-field ones in `validate`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::config::ConfigSource;
use crate::error::{ConfigError, Result};

/// Retryable search-engine statuses. Not configurable.
pub const SEARCH_RETRY_STATUSES: [u16; 3] = [502, 503, 504];

/// Host used by the search client when `ES_HOST` is empty.
pub const DEFAULT_SEARCH_HOST: &str = "http://localhost:9200";

/// Whether a backend failing at startup halts the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    #[default]
    Required,
    Optional,
}

impl Requirement {
    fn from_flag(required: bool) -> Self {
        if required {
            Self::Required
        } else {
            Self::Optional
        }
    }
}

/// Transport security for the relational store.
///
/// Mirrors the libpq `sslmode` values. `VerifyFull` is the default; nothing
/// disables certificate verification unless asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    Disable,
    Prefer,
    Require,
    VerifyCa,
    #[default]
    VerifyFull,
}

impl TlsMode {
    /// Whether the server certificate is checked against a CA.
    pub fn verifies_certificate(self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyFull)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" | "verify_ca" => Ok(Self::VerifyCa),
            "verify-full" | "verify_full" => Ok(Self::VerifyFull),
            other => Err(ConfigError::invalid(
                "DB_SSL_MODE",
                format!("unknown mode '{other}'"),
            )),
        }
    }
}

/// Relational store (PostgreSQL) settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Pool acquire timeout
    pub timeout: Duration,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    pub tls_mode: TlsMode,
    pub tls_root_cert: Option<PathBuf>,
    pub requirement: Requirement,
}

/// Effective pool limits after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_idle: u32,
    pub max_open: u32,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            timeout: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(20),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_idle_conns: 20,
            max_open_conns: 10,
            tls_mode: TlsMode::default(),
            tls_root_cert: None,
            requirement: Requirement::Required,
        }
    }
}

impl SqlSettings {
    pub fn from_source(source: &(impl ConfigSource + ?Sized)) -> Self {
        let defaults = Self::default();

        let port = match u16::try_from(source.get_int("DB_PORT", i64::from(defaults.port))) {
            Ok(port) if port != 0 => port,
            _ => {
                warn!(default = defaults.port, "DB_PORT out of range, using default");
                defaults.port
            }
        };

        let tls_mode = source
            .lookup("DB_SSL_MODE")
            .map(|raw| {
                raw.parse().unwrap_or_else(|e: ConfigError| {
                    warn!(error = %e, default = %defaults.tls_mode, "using default TLS mode");
                    defaults.tls_mode
                })
            })
            .unwrap_or(defaults.tls_mode);

        let tls_root_cert = source
            .lookup("DB_SSL_ROOT_CERT")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Self {
            host: source.get_string("DB_HOST", &defaults.host),
            port,
            database: source.get_string("DB_DATABASE", &defaults.database),
            username: source.get_string("DB_USERNAME", &defaults.username),
            password: source.get_string("DB_PASSWORD", &defaults.password),
            timeout: source.get_secs("DB_TIMEOUT", defaults.timeout.as_secs()),
            dial_timeout: source.get_secs("DB_DIAL_TIMEOUT", defaults.dial_timeout.as_secs()),
            read_timeout: source.get_secs("DB_READ_TIMEOUT", defaults.read_timeout.as_secs()),
            write_timeout: source.get_secs("DB_WRITE_TIMEOUT", defaults.write_timeout.as_secs()),
            max_idle_conns: source.get_u32("DB_MAX_IDLE_CONNS", defaults.max_idle_conns),
            max_open_conns: source.get_u32("DB_MAX_OPEN_CONNS", defaults.max_open_conns),
            tls_mode,
            tls_root_cert,
            requirement: Requirement::from_flag(source.get_bool("DB_REQUIRED", true)),
        }
    }

    /// `host:port` with the port written as decimal text.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pool limits with `max_idle` clamped to `max_open`.
    pub fn pool_limits(&self) -> PoolLimits {
        let max_open = self.max_open_conns;
        let max_idle = if self.max_idle_conns > max_open {
            warn!(
                max_idle = self.max_idle_conns,
                max_open, "DB_MAX_IDLE_CONNS exceeds DB_MAX_OPEN_CONNS, clamping"
            );
            max_open
        } else {
            self.max_idle_conns
        };
        PoolLimits { max_idle, max_open }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("DB_HOST", "must not be empty"));
        }
        if self.max_open_conns == 0 {
            return Err(ConfigError::invalid(
                "DB_MAX_OPEN_CONNS",
                "must be greater than zero",
            ));
        }
        if self.tls_root_cert.is_some() && !self.tls_mode.verifies_certificate() {
            warn!(
                mode = %self.tls_mode,
                "DB_SSL_ROOT_CERT is set but the TLS mode does not verify certificates"
            );
        }
        Ok(())
    }
}

/// Search engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub hosts: Vec<String>,
    pub username: String,
    pub password: String,
    pub max_retries: u32,
    pub retry_statuses: Vec<u16>,
    pub requirement: Requirement,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            hosts: vec![String::new()],
            username: String::new(),
            password: String::new(),
            max_retries: 3,
            retry_statuses: SEARCH_RETRY_STATUSES.to_vec(),
            requirement: Requirement::Required,
        }
    }
}

impl SearchSettings {
    pub fn from_source(source: &(impl ConfigSource + ?Sized)) -> Self {
        let defaults = Self::default();
        Self {
            hosts: source.get_list("ES_HOST", &[""]),
            username: source.get_string("ES_USERNAME", &defaults.username),
            password: source.get_string("ES_PASSWORD", &defaults.password),
            max_retries: source.get_u32("ES_MAX_RETRIES", defaults.max_retries),
            retry_statuses: defaults.retry_statuses,
            requirement: Requirement::from_flag(source.get_bool("ES_REQUIRED", true)),
        }
    }

    /// Configured hosts with blanks removed, or the client default.
    pub fn effective_hosts(&self) -> Vec<String> {
        let hosts: Vec<String> = self
            .hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            vec![DEFAULT_SEARCH_HOST.to_string()]
        } else {
            hosts
        }
    }
}

/// Key-value cache (Redis) settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub addr: String,
    pub password: String,
    pub db: u32,
    pub pool_size: u32,
    pub pool_timeout: Duration,
    pub idle_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub requirement: Requirement,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".to_string(),
            password: String::new(),
            db: 0,
            pool_size: 10,
            pool_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            requirement: Requirement::Required,
        }
    }
}

impl CacheSettings {
    pub fn from_source(source: &(impl ConfigSource + ?Sized)) -> Self {
        let defaults = Self::default();
        Self {
            addr: source.get_string("REDIS_ADDR", &defaults.addr),
            password: source.get_string("REDIS_PASSWORD", &defaults.password),
            db: source.get_u32("REDIS_DB", defaults.db),
            pool_size: source.get_u32("REDIS_POOL_SIZE", defaults.pool_size),
            pool_timeout: source.get_secs("REDIS_POOL_TIMEOUT", defaults.pool_timeout.as_secs()),
            idle_timeout: source.get_secs("REDIS_IDLE_TIMEOUT", defaults.idle_timeout.as_secs()),
            read_timeout: source.get_secs("REDIS_READ_TIMEOUT", defaults.read_timeout.as_secs()),
            write_timeout: source
                .get_secs("REDIS_WRITE_TIMEOUT", defaults.write_timeout.as_secs()),
            requirement: Requirement::from_flag(source.get_bool("REDIS_REQUIRED", true)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::invalid("REDIS_ADDR", "must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::invalid(
                "REDIS_POOL_SIZE",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
