mod worker_task;

pub use worker_task::WorkerTask;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::filters::{LogFilter, TokenCreatedFilter, TokenTransferFilter};
use crate::jobs::{CLEANUP_AUDIT_LOG_JOB, REMOVE_OLD_WORKER_JOBS_JOB, WATCH_CHAIN_JOB};
use crate::poller::{self, Poller};
use crate::repos::Repo;
use crate::scheduler::{
    CleanupAuditLogRunner, JobRegistry, RemoveOldWorkerJobsRunner, Scheduler, WatchChainRunner,
};
use crate::ChainwatchError;

/// The shipped filters, fresh instances per chain so caches stay per chain
pub fn get_default_filters(config: &Config) -> Result<Vec<Arc<dyn LogFilter>>, ChainwatchError> {
    let token_created_filter = match config.token_factory_address {
        Some(factory_address) => TokenCreatedFilter::new()?.with_factory_address(factory_address),
        None => TokenCreatedFilter::new()?,
    };

    Ok(vec![
        Arc::new(token_created_filter),
        Arc::new(TokenTransferFilter::new()?),
    ])
}

/// One poller per configured chain, each talking to that chain's node
pub fn build_pollers<R: Repo>(
    config: &Config,
    repo: Arc<R>,
) -> Result<Vec<Arc<Poller<R>>>, ChainwatchError> {
    config
        .chains
        .iter()
        .map(|chain| -> Result<Arc<Poller<R>>, ChainwatchError> {
            let provider = poller::get_provider(&chain.json_rpc_url)?;

            let poller = get_default_filters(config)?
                .into_iter()
                .fold(Poller::new(chain.clone(), provider, repo.clone()), |poller, filter| {
                    poller.add_filter(filter)
                })
                .with_config(config.get_poller_config());

            Ok(Arc::new(poller))
        })
        .collect()
}

/// Registers the built-in job runners
pub fn build_registry<R: Repo>(
    config: &Config,
    repo: Arc<R>,
    pollers: Vec<Arc<Poller<R>>>,
) -> JobRegistry {
    JobRegistry::new()
        .register(WATCH_CHAIN_JOB, Arc::new(WatchChainRunner::new(pollers)))
        .register(
            REMOVE_OLD_WORKER_JOBS_JOB,
            Arc::new(RemoveOldWorkerJobsRunner::new(repo.clone())),
        )
        .register(
            CLEANUP_AUDIT_LOG_JOB,
            Arc::new(CleanupAuditLogRunner::new(repo, config.retention_config.clone())),
        )
}

/// Validates the setup, migrates the store, recovers jobs a previous worker left
/// claimed, seeds recurring jobs and spawns the scheduler loop.
/// Nothing is written when validation fails.
pub async fn start<R: Repo>(
    config: &Config,
    repo: Arc<R>,
    registry: JobRegistry,
) -> Result<WorkerTask, ChainwatchError> {
    config.validate()?;

    let recurring_jobs = config.get_recurring_jobs();
    registry.validate(recurring_jobs.iter().map(|job| job.job_type.as_str()))?;

    repo.migrate().await?;

    let scheduler = Arc::new(Scheduler::new(repo, registry, config.get_scheduler_config()));

    // Recovery first: a stale claim still counts as unfinished and would block seeding
    let recovered_count = scheduler.recover_stale_jobs().await?;
    if recovered_count > 0 {
        info!(recovered_count, "Recovered interrupted jobs");
    }

    for recurring_job in &recurring_jobs {
        if let Some(job) = scheduler.ensure_recurring_job(recurring_job).await? {
            info!(
                job_id = job.id,
                job_type = %job.job_type,
                data = %job.data,
                "Seeded recurring job"
            );
        }
    }

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let task = tokio::spawn(scheduler.run_until_shutdown(shutdown_receiver));

    info!(chains = config.chains.len(), "Worker started");

    Ok(WorkerTask::new(task, shutdown_sender))
}
