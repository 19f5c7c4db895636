//! Error types for bedrock-backends

use std::fmt;
use std::time::Duration;

use bedrock_core::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

/// The three provisioned backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Sql,
    Search,
    Cache,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sql => "relational store",
            Self::Search => "search engine",
            Self::Cache => "cache",
        })
    }
}

#[derive(Error, Debug)]
pub enum SqlError {
    #[error("Connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Connection not established within {0:?}")]
    DialTimeout(Duration),

    #[error("Liveness probe failed: {0}")]
    Ping(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search host '{host}': {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode search response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Search engine returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache URL: {0}")]
    Url(String),

    #[error("Failed to create cache pool: {0}")]
    Pool(#[from] deadpool_redis::CreatePoolError),

    #[error("Failed to check out cache connection: {0}")]
    Checkout(#[from] deadpool_redis::PoolError),

    #[error("Cache command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache value codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Unexpected PING reply: {0}")]
    UnexpectedPong(String),

    #[error("Cache command '{command}' timed out after {limit:?}")]
    Timeout {
        command: &'static str,
        limit: Duration,
    },
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Relational store: {0}")]
    Sql(#[from] SqlError),

    #[error("Search engine: {0}")]
    Search(#[from] SearchError),

    #[error("Cache: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An optional backend failed at startup and its slot is empty
    #[error("{0} is not available")]
    Unavailable(BackendKind),

    #[error("Setup step '{step}' failed: {source}")]
    Setup {
        step: String,
        #[source]
        source: Box<BackendError>,
    },
}

impl BackendError {
    pub fn setup(step: impl Into<String>, source: BackendError) -> Self {
        Self::Setup {
            step: step.into(),
            source: Box::new(source),
        }
    }
}
