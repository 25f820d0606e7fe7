use std::process::ExitCode;
use std::sync::Arc;

use chainwatch::{ChainwatchError, Config, PostgresRepo};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chainwatch=info")),
        )
        .init();

    let worker = match start().await {
        Ok(worker) => worker,
        Err(startup_error) => {
            error!("Worker failed to start: {startup_error}");
            return ExitCode::FAILURE;
        }
    };

    shutdown_signal().await;
    info!("Shutting down");
    if worker.shutdown().await.is_err() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn start() -> Result<chainwatch::WorkerTask, ChainwatchError> {
    let config = Config::from_env()?;

    let database_url = config
        .database_url
        .as_deref()
        .ok_or(chainwatch::ConfigError::MissingEnv("DATABASE_URL"))?;
    let repo = Arc::new(PostgresRepo::new(database_url).await?);

    let pollers = chainwatch::build_pollers(&config, repo.clone())?;
    let registry = chainwatch::build_registry(&config, repo.clone(), pollers);

    chainwatch::start(&config, repo, registry).await
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(signal_error) => {
            error!("Could not listen for SIGTERM: {signal_error}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
