//! `--check`: probe every provisioned backend and report one line each

use bedrock_backends::{BackendError, BackendKind, Backends};

#[derive(Debug)]
pub enum Status {
    Ok,
    /// Optional backend that failed at startup
    Unavailable,
    Failed(String),
}

impl Status {
    fn from_probe(result: Result<(), BackendError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(BackendError::Unavailable(_)) => Self::Unavailable,
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

fn label(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Sql => "sql",
        BackendKind::Search => "search",
        BackendKind::Cache => "cache",
    }
}

pub fn status_line(kind: BackendKind, status: &Status) -> String {
    match status {
        Status::Ok => format!("{}: ok", label(kind)),
        Status::Unavailable => format!("{}: unavailable", label(kind)),
        Status::Failed(reason) => format!("{}: error: {}", label(kind), reason),
    }
}

async fn probe(backends: &Backends, kind: BackendKind) -> Status {
    let result = match kind {
        BackendKind::Sql => match backends.sql() {
            Ok(sql) => sql.ping().await.map_err(BackendError::from),
            Err(e) => Err(e),
        },
        BackendKind::Search => match backends.search() {
            Ok(search) => search.ping().await.map_err(BackendError::from),
            Err(e) => Err(e),
        },
        BackendKind::Cache => match backends.cache() {
            Ok(cache) => cache.ping().await.map_err(BackendError::from),
            Err(e) => Err(e),
        },
    };
    Status::from_probe(result)
}

/// Probe each backend in provisioning order.
pub async fn run(backends: &Backends) -> Vec<(BackendKind, Status)> {
    let mut report = Vec::with_capacity(3);
    for kind in [BackendKind::Sql, BackendKind::Search, BackendKind::Cache] {
        report.push((kind, probe(backends, kind).await));
    }
    report
}
