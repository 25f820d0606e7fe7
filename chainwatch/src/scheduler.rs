mod error;
mod registry;
mod runners;

pub use error::{JobError, SchedulerError};
pub use registry::{JobRegistry, JobRunner};
pub use runners::{CleanupAuditLogRunner, RemoveOldWorkerJobsRunner, WatchChainRunner};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::jobs::{
    to_chrono_duration, CronSchedule, Job, JobCompletion, UnsavedJob, UnsavedJobAuditRecord,
};
use crate::repos::Repo;
use crate::retention::RetentionConfig;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_JOB_TIMEOUT_MS: u64 = 5 * 60 * 1_000;
/// Most jobs claimed per tick
pub const DEFAULT_BATCH_SIZE: i64 = 100;
/// Added to the job timeout before an unfinished claim counts as abandoned
pub const DEFAULT_STALE_CLAIM_GRACE_MS: u64 = 60 * 1_000;

const RECORD_COMPLETION_ATTEMPTS: u32 = 3;
const RECORD_COMPLETION_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Runs exceeding this are recorded as failed
    pub job_timeout: Duration,
    pub batch_size: i64,
    pub stale_claim_grace: Duration,
    pub retention_config: RetentionConfig,
}

impl SchedulerConfig {
    /// Claims started before the returned instant belong to a dead or disconnected worker
    pub fn get_stale_claim_cutoff(&self, now: &DateTime<Utc>) -> DateTime<Utc> {
        *now - to_chrono_duration(self.job_timeout + self.stale_claim_grace)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            job_timeout: Duration::from_millis(DEFAULT_JOB_TIMEOUT_MS),
            batch_size: DEFAULT_BATCH_SIZE,
            stale_claim_grace: Duration::from_millis(DEFAULT_STALE_CLAIM_GRACE_MS),
            retention_config: RetentionConfig::default(),
        }
    }
}

/// Claims due jobs and runs them one after another.
///
/// Several schedulers may share one store: claiming is a conditional update,
/// so each job runs at most once however many workers see it due.
pub struct Scheduler<R: Repo> {
    repo: Arc<R>,
    registry: JobRegistry,
    config: SchedulerConfig,
}

impl<R: Repo> Scheduler<R> {
    pub fn new(repo: Arc<R>, registry: JobRegistry, config: SchedulerConfig) -> Self {
        Self {
            repo,
            registry,
            config,
        }
    }

    pub fn get_registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub async fn schedule_job(&self, job: &UnsavedJob) -> Result<Job, SchedulerError> {
        if let Some(cron_schedule) = &job.cron_schedule {
            CronSchedule::parse(cron_schedule)?;
        }

        let job = self.repo.create_job(job).await?;
        debug!(job_id = job.id, job_type = %job.job_type, due = %job.due, "Scheduled job");

        Ok(job)
    }

    /// Schedules `job` unless an unfinished job of the same type and data exists
    pub async fn ensure_recurring_job(
        &self,
        job: &UnsavedJob,
    ) -> Result<Option<Job>, SchedulerError> {
        if self.repo.has_unfinished_job(&job.job_type, &job.data).await? {
            return Ok(None);
        }

        self.schedule_job(job).await.map(Some)
    }

    /// Finishes jobs whose claim outlived the job timeout as failed, with their usual
    /// retry and cron successors. Returns how many were recovered.
    pub async fn recover_stale_jobs(&self) -> Result<usize, SchedulerError> {
        let now = Utc::now();
        let claimed_before = self.config.get_stale_claim_cutoff(&now);
        let stale_jobs = self.repo.get_stale_jobs(&claimed_before, self.config.batch_size).await?;

        for job in &stale_jobs {
            warn!(
                job_id = job.id,
                job_type = %job.job_type,
                started = ?job.started,
                "Recovering interrupted job"
            );

            let started_at = job.started.unwrap_or(now);
            let completion = self.get_completion(job, started_at, now, Err(JobError::Interrupted));
            self.record_completion(&completion).await?;
        }

        Ok(stale_jobs.len())
    }

    /// Recovers stale claims, then claims and runs every job due now.
    /// Returns how many jobs this scheduler ran.
    pub async fn tick(&self) -> Result<usize, SchedulerError> {
        if let Err(scheduler_error) = self.recover_stale_jobs().await {
            error!("Could not recover stale jobs: {scheduler_error}");
        }

        let due_jobs = self.repo.get_due_jobs(&Utc::now(), self.config.batch_size).await?;

        let mut executed_count = 0;
        for due_job in due_jobs {
            let job = match self.repo.claim_job(due_job.id, &Utc::now()).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    debug!(job_id = due_job.id, "Job already claimed");
                    continue;
                }
                Err(repo_error) => {
                    error!(job_id = due_job.id, "Could not claim job: {repo_error}");
                    continue;
                }
            };

            let job_id = job.id;
            if let Err(scheduler_error) = self.execute(job).await {
                // The claim goes stale and recover_stale_jobs finishes the job
                error!(job_id, "Could not record job outcome: {scheduler_error}");
            }
            executed_count += 1;
        }

        Ok(executed_count)
    }

    /// Runs a claimed job and records its outcome. Returns the created successors.
    #[tracing::instrument(
        name = "job",
        skip_all,
        fields(job_id = job.id, job_type = %job.job_type)
    )]
    pub async fn execute(&self, job: Job) -> Result<Vec<Job>, SchedulerError> {
        let started_at = job.started.unwrap_or_else(Utc::now);
        let outcome = self.run(&job).await;
        let finished_at = Utc::now();

        let completion = self.get_completion(&job, started_at, finished_at, outcome);
        let successors = self.record_completion(&completion).await?;

        for successor in &successors {
            debug!(successor_id = successor.id, due = %successor.due, "Rescheduled");
        }

        Ok(successors)
    }

    async fn run(&self, job: &Job) -> Result<serde_json::Value, JobError> {
        let runner = self
            .registry
            .get(&job.job_type)
            .ok_or_else(|| JobError::UnknownJobType(job.job_type.clone()))?;

        let run = AssertUnwindSafe(runner.run(job)).catch_unwind();

        match tokio::time::timeout(self.config.job_timeout, run).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => Err(JobError::Failed(format!(
                "Runner panicked: {}",
                get_panic_message(panic.as_ref())
            ))),
            Err(_elapsed) => Err(JobError::TimedOut(self.config.job_timeout)),
        }
    }

    async fn record_completion(
        &self,
        completion: &JobCompletion,
    ) -> Result<Vec<Job>, SchedulerError> {
        let mut attempt = 1;

        loop {
            match self.repo.record_job_completion(completion).await {
                Ok(successors) => return Ok(successors),
                Err(repo_error) if attempt < RECORD_COMPLETION_ATTEMPTS => {
                    warn!(attempt, "Could not record job completion, retrying: {repo_error}");
                    tokio::time::sleep(RECORD_COMPLETION_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(repo_error) => return Err(repo_error.into()),
            }
        }
    }

    fn get_completion(
        &self,
        job: &Job,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcome: Result<serde_json::Value, JobError>,
    ) -> JobCompletion {
        let duration_ms = (finished_at - started_at).num_milliseconds();
        let mut successors = vec![];
        let mut is_unregistered = false;

        let audit_record = match outcome {
            Ok(result) => {
                info!(duration_ms, "Job completed");
                UnsavedJobAuditRecord::completed(job, started_at, finished_at, result)
            }
            Err(job_error) => {
                warn!(duration_ms, "Job failed: {job_error}");

                is_unregistered = matches!(job_error, JobError::UnknownJobType(_));
                successors.extend(self.get_retry(job, &job_error, &finished_at));

                UnsavedJobAuditRecord::failed(job, started_at, finished_at, job_error.to_string())
            }
        };

        // Unregistered types get no successor
        if !is_unregistered {
            successors.extend(self.get_cron_successor(job, &finished_at));
        }

        JobCompletion {
            job_id: job.id,
            finished_at,
            audit_record,
            successors,
        }
    }

    fn get_retry(
        &self,
        job: &Job,
        job_error: &JobError,
        finished_at: &DateTime<Utc>,
    ) -> Option<UnsavedJob> {
        // Cron jobs are already re-run by their successor
        if !job.auto_reschedule_on_failure
            || job_error.is_permanent()
            || job.cron_schedule.is_some()
        {
            return None;
        }

        let delay = to_chrono_duration(job.get_auto_reschedule_on_failure_delay());
        let due = *finished_at + delay;

        Some(UnsavedJob::successor_of(
            job,
            due,
            self.config.retention_config.job_retention_window,
        ))
    }

    fn get_cron_successor(&self, job: &Job, finished_at: &DateTime<Utc>) -> Option<UnsavedJob> {
        let cron_schedule = match CronSchedule::parse(job.cron_schedule.as_deref()?) {
            Ok(cron_schedule) => cron_schedule,
            Err(invalid_cron_schedule) => {
                error!("Not rescheduling: {invalid_cron_schedule}");
                return None;
            }
        };

        let due = cron_schedule.next_due(&job.due, finished_at)?;

        Some(UnsavedJob::successor_of(
            job,
            due,
            self.config.retention_config.job_retention_window,
        ))
    }

    /// Ticks until `shutdown` flips. A tick in progress always runs to completion.
    pub async fn run_until_shutdown(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = tick_interval.tick() => {
                    if let Err(scheduler_error) = self.tick().await {
                        error!("Scheduler tick failed: {scheduler_error}");
                    }
                }
            }
        }
    }
}

fn get_panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
