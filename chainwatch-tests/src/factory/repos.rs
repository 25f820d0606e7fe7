use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chainwatch::jobs::{JobCompletion, JobId};
use chainwatch::{
    CursorKey, CursorRepo, Job, JobAuditRecord, JobRepo, MemoryRepo, Notification,
    NotificationRepo, Repo, RepoError, UnsavedJob, UnsavedNotification, UserRepo,
};
use chrono::{DateTime, Utc};

/// In-memory repo whose next `failures` completion writes fail as if the
/// connection dropped
#[derive(Clone, Debug)]
pub struct FlakyRepo {
    repo: MemoryRepo,
    completion_failures: Arc<AtomicUsize>,
}

impl FlakyRepo {
    pub fn failing_completions(failures: usize) -> Self {
        Self {
            repo: MemoryRepo::new(),
            completion_failures: Arc::new(AtomicUsize::new(failures)),
        }
    }

    /// Lets every later completion write through
    pub fn reconnect(&self) {
        self.completion_failures.store(0, Ordering::SeqCst);
    }

    pub fn get_memory_repo(&self) -> &MemoryRepo {
        &self.repo
    }

    fn take_failure(&self) -> bool {
        self.completion_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl CursorRepo for FlakyRepo {
    async fn get_last_processed_block(&self, key: &CursorKey) -> Result<Option<u64>, RepoError> {
        self.repo.get_last_processed_block(key).await
    }

    async fn set_last_processed_block(
        &self,
        key: &CursorKey,
        block: u64,
    ) -> Result<(), RepoError> {
        self.repo.set_last_processed_block(key, block).await
    }

    async fn reset_cursor(&self, key: &CursorKey, block: Option<u64>) -> Result<(), RepoError> {
        self.repo.reset_cursor(key, block).await
    }
}

#[async_trait::async_trait]
impl JobRepo for FlakyRepo {
    async fn create_job(&self, job: &UnsavedJob) -> Result<Job, RepoError> {
        self.repo.create_job(job).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepoError> {
        self.repo.get_job(id).await
    }

    async fn get_due_jobs(&self, now: &DateTime<Utc>, limit: i64) -> Result<Vec<Job>, RepoError> {
        self.repo.get_due_jobs(now, limit).await
    }

    async fn claim_job(&self, id: JobId, now: &DateTime<Utc>) -> Result<Option<Job>, RepoError> {
        self.repo.claim_job(id, now).await
    }

    async fn get_stale_jobs(
        &self,
        claimed_before: &DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Job>, RepoError> {
        self.repo.get_stale_jobs(claimed_before, limit).await
    }

    async fn record_job_completion(
        &self,
        completion: &JobCompletion,
    ) -> Result<Vec<Job>, RepoError> {
        if self.take_failure() {
            return Err(RepoError::NotConnected("connection reset".to_string()));
        }

        self.repo.record_job_completion(completion).await
    }

    async fn has_unfinished_job(
        &self,
        job_type: &str,
        data: &serde_json::Value,
    ) -> Result<bool, RepoError> {
        self.repo.has_unfinished_job(job_type, data).await
    }

    async fn remove_old_jobs(&self, now: &DateTime<Utc>) -> Result<u64, RepoError> {
        self.repo.remove_old_jobs(now).await
    }

    async fn get_audit_records(&self, job_id: JobId) -> Result<Vec<JobAuditRecord>, RepoError> {
        self.repo.get_audit_records(job_id).await
    }

    async fn cleanup_audit_log(
        &self,
        completed_before: &DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        self.repo.cleanup_audit_log(completed_before).await
    }
}

#[async_trait::async_trait]
impl NotificationRepo for FlakyRepo {
    async fn create_notification(
        &self,
        notification: &UnsavedNotification,
    ) -> Result<bool, RepoError> {
        self.repo.create_notification(notification).await
    }

    async fn get_notifications(&self, user_id: i64) -> Result<Vec<Notification>, RepoError> {
        self.repo.get_notifications(user_id).await
    }
}

#[async_trait::async_trait]
impl UserRepo for FlakyRepo {
    async fn find_user_id_by_wallet(&self, address: &str) -> Result<Option<i64>, RepoError> {
        self.repo.find_user_id_by_wallet(address).await
    }
}

#[async_trait::async_trait]
impl Repo for FlakyRepo {
    async fn migrate(&self) -> Result<(), RepoError> {
        self.repo.migrate().await
    }
}
