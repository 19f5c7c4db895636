/// Structured error types for bedrock-core.
///
/// Resolving a single setting never fails (absent or malformed values fall
/// back to their default). Errors here come from validating a resolved
/// settings record or from loading a `.env` file.
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bedrock-core operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A resolved setting violates an invariant of its record
    #[error("Invalid setting '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// The `.env` file exists but could not be parsed
    #[error("Failed to load env file {path:?}: {source}")]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Result type alias for bedrock-core operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Create an invalid setting error
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a dotenv loading error
    pub fn dotenv(path: impl Into<PathBuf>, source: dotenvy::Error) -> Self {
        Self::Dotenv {
            path: path.into(),
            source,
        }
    }
}
