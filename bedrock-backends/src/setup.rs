//! Ordered setup steps run after provisioning
//!
//! Each step must be idempotent: it runs on every process start. The default
//! steps are placeholders for schema, column, index and repository
//! initialization and only log.

use async_trait::async_trait;
use bedrock_core::ConfigError;
use tracing::{debug, info};

use crate::error::{BackendError, Result};
use crate::registry::Backends;

#[async_trait]
pub trait SetupStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, backends: &Backends) -> Result<()>;
}

/// A step with nothing to do yet.
#[derive(Debug, Clone, Copy)]
pub struct NoopStep(pub &'static str);

#[async_trait]
impl SetupStep for NoopStep {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self, _backends: &Backends) -> Result<()> {
        debug!(step = self.0, "no-op setup step");
        Ok(())
    }
}

/// `CREATE TABLE IF NOT EXISTS` against the relational store.
#[derive(Debug, Clone)]
pub struct CreateTable {
    name: String,
    statement: String,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl CreateTable {
    /// `columns` is the body of the column list, e.g. `id BIGINT PRIMARY KEY`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when `table` is not a plain identifier
    /// (optionally schema-qualified).
    pub fn new(table: &str, columns: &str) -> std::result::Result<Self, ConfigError> {
        if !table.split('.').all(is_identifier) || table.split('.').count() > 2 {
            return Err(ConfigError::invalid(
                "table",
                format!("'{table}' is not a valid table name"),
            ));
        }
        Ok(Self {
            name: format!("create_table_{table}"),
            statement: format!("CREATE TABLE IF NOT EXISTS {table} ({columns})"),
        })
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

#[async_trait]
impl SetupStep for CreateTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, backends: &Backends) -> Result<()> {
        sqlx::query(&self.statement)
            .execute(backends.pool()?)
            .await
            .map_err(|e| BackendError::Sql(e.into()))?;
        Ok(())
    }
}

/// Tables, columns, indexes, repositories, in that order.
pub fn default_steps() -> Vec<Box<dyn SetupStep>> {
    vec![
        Box::new(NoopStep("init_tables")),
        Box::new(NoopStep("init_columns")),
        Box::new(NoopStep("init_index")),
        Box::new(NoopStep("init_repos")),
    ]
}

/// Run `steps` in order, stopping at the first failure.
pub async fn run_setup(backends: &Backends, steps: &[Box<dyn SetupStep>]) -> Result<()> {
    for step in steps {
        info!(step = step.name(), "running setup step");
        step.run(backends)
            .await
            .map_err(|e| BackendError::setup(step.name(), e))?;
    }
    info!(steps = steps.len(), "setup complete");
    Ok(())
}
