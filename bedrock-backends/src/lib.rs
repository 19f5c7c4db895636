//! bedrock-backends: startup provisioning of pooled backends
//!
//! Connects a PostgreSQL pool, an Elasticsearch-compatible search client
//! and a Redis cache, and publishes them through one shared [`Backends`]
//! value instead of process globals.
//!
//! ```ignore
//! let backends = bedrock_backends::provision(&bedrock_core::Env).await?;
//! bedrock_backends::run_setup(&backends, &bedrock_backends::default_steps()).await?;
//! let cached: Option<String> = backends.cache()?.get("greeting").await?;
//! ```

pub mod bootstrap;
pub mod cache;
pub mod error;
pub mod registry;
pub mod search;
pub mod setup;
pub mod sql;

pub use bootstrap::provision;
pub use cache::{CacheConnector, RedisCache};
pub use error::{BackendError, BackendKind, CacheError, Result, SearchError, SqlError};
pub use registry::Backends;
pub use search::{RetryPolicy, SearchClient};
pub use setup::{default_steps, run_setup, CreateTable, NoopStep, SetupStep};
pub use sql::SqlConnector;
