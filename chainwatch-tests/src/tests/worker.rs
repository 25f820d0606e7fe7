#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chainwatch::jobs::{CLEANUP_AUDIT_LOG_JOB, REMOVE_OLD_WORKER_JOBS_JOB, WATCH_CHAIN_JOB};
    use chainwatch::{
        build_registry, Chain, ChainwatchError, Config, ConfigError, CursorKey, CursorRepo,
        JobRegistry, JobRepo, MemoryRepo, Poller, StartBlock, WorkerTask,
    };
    use chrono::Utc;
    use tokio::sync::watch;

    use crate::factory::{RecordingFilter, StubProvider};
    use crate::test_runner;

    const CHAIN: &str = "mainnet";
    const YEARLY: &str = "0 0 0 1 1 *";

    fn config() -> Config {
        Config::new()
            .add_chain(Chain::new(CHAIN, "http://localhost:8545"))
            .with_start_block(StartBlock::Genesis)
            .with_tick_interval_ms(10)
            .with_watch_chain_cron(YEARLY)
    }

    fn registry(config: &Config, repo: &Arc<MemoryRepo>, head: u64) -> JobRegistry {
        let provider = Arc::new(StubProvider::new(head));
        let poller = Poller::new(config.chains[0].clone(), provider, repo.clone())
            .add_filter(Arc::new(RecordingFilter::token_transfer("transfers")))
            .with_config(config.get_poller_config());

        build_registry(config, repo.clone(), vec![Arc::new(poller)])
    }

    async fn count_unfinished(repo: &MemoryRepo, job_type: &str) -> usize {
        repo.get_all_jobs()
            .await
            .iter()
            .filter(|job| job.job_type == job_type && !job.is_finished())
            .count()
    }

    #[tokio::test]
    pub async fn refuses_to_start_without_runners_for_recurring_jobs() {
        let repo = test_runner::new_memory_repo();

        let result = chainwatch::start(&config(), repo.clone(), JobRegistry::new()).await;

        assert!(matches!(
            result,
            Err(ChainwatchError::Config(ConfigError::UnregisteredJobType(job_type)))
                if job_type == WATCH_CHAIN_JOB
        ));
        assert!(repo.get_all_jobs().await.is_empty());
    }

    #[tokio::test]
    pub async fn refuses_to_start_without_chains() {
        let repo = test_runner::new_memory_repo();
        let config = Config::new();

        let result = chainwatch::start(&config, repo.clone(), JobRegistry::new()).await;

        assert!(matches!(result, Err(ChainwatchError::Config(ConfigError::NoChain))));
    }

    #[tokio::test]
    pub async fn seeds_recurring_jobs_and_watches_chains_until_shutdown() {
        let repo = test_runner::new_memory_repo();
        let config = config();

        let registry = registry(&config, &repo, 1_000);
        let worker_task = chainwatch::start(&config, repo.clone(), registry).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        worker_task.shutdown().await.unwrap();

        let cursor =
            repo.get_last_processed_block(&CursorKey::new(CHAIN, "transfers")).await.unwrap();
        assert_eq!(cursor, Some(500));

        let audit_records = repo.get_all_audit_records().await;
        let watch_record =
            audit_records.iter().find(|record| record.job_type == WATCH_CHAIN_JOB).unwrap();
        assert!(watch_record.is_completed());
        assert_eq!(watch_record.result.as_ref().unwrap()["chain"], CHAIN);

        for job_type in [WATCH_CHAIN_JOB, REMOVE_OLD_WORKER_JOBS_JOB, CLEANUP_AUDIT_LOG_JOB] {
            assert_eq!(count_unfinished(&repo, job_type).await, 1, "{job_type}");
        }
    }

    #[tokio::test]
    pub async fn does_not_seed_recurring_jobs_twice_across_restarts() {
        let repo = test_runner::new_memory_repo();
        let config = config();

        for _restart in 0..2 {
            let registry = registry(&config, &repo, 1_000);
            let worker_task = chainwatch::start(&config, repo.clone(), registry).await.unwrap();
            worker_task.shutdown().await.unwrap();
        }

        // Shut down before the first tick, so nothing ran
        assert_eq!(repo.get_all_jobs().await.len(), 3);
        assert!(repo.get_all_audit_records().await.is_empty());
        assert_eq!(count_unfinished(&repo, WATCH_CHAIN_JOB).await, 1);
    }

    #[tokio::test]
    pub async fn recovers_interrupted_jobs_on_restart() {
        let repo = test_runner::new_memory_repo();
        let config = config();

        let job_registry = registry(&config, &repo, 1_000);
        let worker_task = chainwatch::start(&config, repo.clone(), job_registry).await.unwrap();
        worker_task.shutdown().await.unwrap();

        // A worker claimed the watch job, then died
        let jobs = repo.get_all_jobs().await;
        let watch_job = jobs.iter().find(|job| job.job_type == WATCH_CHAIN_JOB).unwrap();
        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        repo.claim_job(watch_job.id, &an_hour_ago).await.unwrap().unwrap();

        let job_registry = registry(&config, &repo, 1_000);
        let worker_task = chainwatch::start(&config, repo.clone(), job_registry).await.unwrap();
        worker_task.shutdown().await.unwrap();

        let audit_records = repo.get_audit_records(watch_job.id).await.unwrap();
        assert_eq!(audit_records.len(), 1);
        assert_eq!(audit_records[0].status, "failed");
        assert_eq!(audit_records[0].error.as_deref(), Some("Interrupted before completion"));

        let watch_jobs: Vec<_> = repo
            .get_all_jobs()
            .await
            .into_iter()
            .filter(|job| job.job_type == WATCH_CHAIN_JOB)
            .collect();
        assert_eq!(watch_jobs.len(), 2);
        assert_eq!(count_unfinished(&repo, WATCH_CHAIN_JOB).await, 1);
        let successor = watch_jobs.iter().find(|job| !job.is_finished()).unwrap();
        assert_eq!(successor.rescheduled_from_job, Some(watch_job.id));
    }

    #[tokio::test]
    pub async fn reports_a_scheduler_loop_that_panicked() {
        let (shutdown_sender, _shutdown_receiver) = watch::channel(false);
        let task = tokio::spawn(async { panic!("scheduler loop crashed") });

        let result = WorkerTask::new(task, shutdown_sender).shutdown().await;

        assert!(result.unwrap_err().is_panic());
    }
}
