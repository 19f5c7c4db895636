//! bedrock - backend provisioning for the service
//!
//! Loads `.env`, sets up logging, connects the relational store, search
//! engine and cache, runs the setup steps, then holds the pools open until
//! Ctrl+C / SIGTERM and closes them.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bedrock_backends::{default_steps, provision, run_setup};
use bedrock_core::{load_dotenv, ConfigSource, Env};
use clap::Parser;
use tracing::{error, info};

mod check;
mod tracing_setup;

use tracing_setup::{LogLevel, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "bedrock",
    author,
    version,
    about = "Provision the database, search and cache backends for the service",
    long_about = "Provision the database, search and cache backends for the service. \
                  Settings come from the environment (and ./.env); see DB_*, ES_* and REDIS_*."
)]
struct Cli {
    /// Log level: debug, info, warn, error [env: LOG_LEVEL, default: info]
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Append log output to this file [env: LOG_FILE, default: logs.txt]
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log to stdout only
    #[arg(long, conflicts_with = "log_file")]
    no_log_file: bool,

    /// Read environment from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Provision, run setup, probe every backend and exit
    #[arg(long)]
    check: bool,
}

fn tracing_config(cli: &Cli) -> TracingConfig {
    let level = match cli.log_level {
        Some(ref level) => LogLevel::parse(level),
        None => LogLevel::parse(&Env.get_string("LOG_LEVEL", "info")),
    };

    let log_file = if cli.no_log_file {
        None
    } else {
        Some(
            cli.log_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(Env.get_string("LOG_FILE", "logs.txt"))),
        )
    };

    TracingConfig { level, log_file }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // before tracing so LOG_LEVEL / LOG_FILE can come from the file
    let env_file = load_dotenv(cli.env_file.as_deref())?;

    let config = tracing_config(&cli);
    tracing_setup::init(&config)?;
    info!(
        level = config.level.as_str(),
        env_file = ?env_file,
        log_file = ?config.log_file,
        "starting bedrock"
    );

    let backends = provision(&Env)
        .await
        .context("backend provisioning failed")?;

    if let Err(e) = run_setup(&backends, &default_steps()).await {
        backends.close().await;
        return Err(e).context("setup failed");
    }

    if cli.check {
        let report = check::run(&backends).await;
        backends.close().await;

        for (kind, status) in &report {
            println!("{}", check::status_line(*kind, status));
        }
        if report.iter().any(|(_, status)| status.is_failure()) {
            bail!("backend check failed");
        }
        return Ok(());
    }

    info!("backends ready, waiting for shutdown signal");
    shutdown_signal().await;
    backends.close().await;
    info!("shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting shutdown");
        }
    }
}
