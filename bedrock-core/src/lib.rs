//! bedrock-core: configuration for backend provisioning
//!
//! Resolves named settings with defaults and turns them into one immutable
//! settings record per backend (relational store, search engine, cache).

pub mod config;
pub mod error;
pub mod settings;

pub use config::{load_dotenv, ConfigSource, Env};
pub use error::{ConfigError, Result};
pub use settings::{
    CacheSettings, PoolLimits, Requirement, SearchSettings, SqlSettings, TlsMode,
    DEFAULT_SEARCH_HOST, SEARCH_RETRY_STATUSES,
};
