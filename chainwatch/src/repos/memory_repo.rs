use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::cursors::{CursorKey, FilterCursor};
use crate::jobs::{Job, JobAuditRecord, JobCompletion, JobId, UnsavedJob};
use crate::notifications::{Notification, UnsavedNotification};

use super::repo::{CursorRepo, JobRepo, NotificationRepo, Repo, RepoError, UserRepo};

#[derive(Debug, Default)]
struct State {
    cursors: HashMap<CursorKey, FilterCursor>,
    jobs: BTreeMap<JobId, Job>,
    last_job_id: JobId,
    audit_records: Vec<JobAuditRecord>,
    last_audit_record_id: i64,
    notifications: Vec<Notification>,
    idempotency_keys: HashSet<String>,
    user_wallets: HashMap<String, i64>,
}

impl State {
    fn insert_job(&mut self, job: &UnsavedJob) -> Job {
        self.last_job_id += 1;
        let job = job.clone().into_job(self.last_job_id);
        self.jobs.insert(job.id, job.clone());

        job
    }
}

/// Process-local store with the same semantics as `PostgresRepo`.
/// Every operation holds one lock, so multi-row writes are atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepo {
    state: Arc<Mutex<State>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user_wallet(&self, address: &str, user_id: i64) {
        let mut state = self.state.lock().await;
        state.user_wallets.insert(address.to_lowercase(), user_id);
    }

    pub async fn get_all_jobs(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        state.jobs.values().cloned().collect()
    }

    pub async fn get_all_audit_records(&self) -> Vec<JobAuditRecord> {
        let state = self.state.lock().await;
        state.audit_records.clone()
    }

    pub async fn get_all_notifications(&self) -> Vec<Notification> {
        let state = self.state.lock().await;
        state.notifications.clone()
    }

    /// Inserts a record as is, bypassing job completion
    pub async fn insert_audit_record(&self, record: JobAuditRecord) {
        let mut state = self.state.lock().await;
        state.last_audit_record_id = state.last_audit_record_id.max(record.id);
        state.audit_records.push(record);
    }
}

#[async_trait::async_trait]
impl CursorRepo for MemoryRepo {
    async fn get_last_processed_block(&self, key: &CursorKey) -> Result<Option<u64>, RepoError> {
        let state = self.state.lock().await;

        Ok(state.cursors.get(key).map(|c| c.get_last_processed_block()))
    }

    async fn set_last_processed_block(
        &self,
        key: &CursorKey,
        block: u64,
    ) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;

        let block = match state.cursors.get(key) {
            Some(cursor) => cursor.get_last_processed_block().max(block),
            None => block,
        };
        state.cursors.insert(key.clone(), FilterCursor::new(key, block));

        Ok(())
    }

    async fn reset_cursor(&self, key: &CursorKey, block: Option<u64>) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;

        match block {
            Some(block) => state.cursors.insert(key.clone(), FilterCursor::new(key, block)),
            None => state.cursors.remove(key),
        };

        Ok(())
    }
}

#[async_trait::async_trait]
impl JobRepo for MemoryRepo {
    async fn create_job(&self, job: &UnsavedJob) -> Result<Job, RepoError> {
        let mut state = self.state.lock().await;

        Ok(state.insert_job(job))
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepoError> {
        let state = self.state.lock().await;

        Ok(state.jobs.get(&id).cloned())
    }

    async fn get_due_jobs(&self, now: &DateTime<Utc>, limit: i64) -> Result<Vec<Job>, RepoError> {
        let state = self.state.lock().await;

        let mut due_jobs: Vec<_> = state.jobs.values().filter(|j| j.is_due(now)).cloned().collect();
        due_jobs.sort_by_key(|j| (j.due, j.id));
        due_jobs.truncate(limit.max(0) as usize);

        Ok(due_jobs)
    }

    async fn claim_job(&self, id: JobId, now: &DateTime<Utc>) -> Result<Option<Job>, RepoError> {
        let mut state = self.state.lock().await;

        match state.jobs.get_mut(&id) {
            Some(job) if !job.is_claimed() => {
                job.started = Some(*now);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_stale_jobs(
        &self,
        claimed_before: &DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Job>, RepoError> {
        let state = self.state.lock().await;

        let mut stale_jobs: Vec<_> = state
            .jobs
            .values()
            .filter(|j| !j.is_finished() && j.started.is_some_and(|s| s < *claimed_before))
            .cloned()
            .collect();
        stale_jobs.sort_by_key(|j| (j.started, j.id));
        stale_jobs.truncate(limit.max(0) as usize);

        Ok(stale_jobs)
    }

    async fn record_job_completion(
        &self,
        completion: &JobCompletion,
    ) -> Result<Vec<Job>, RepoError> {
        let mut state = self.state.lock().await;

        let job = state
            .jobs
            .get_mut(&completion.job_id)
            .ok_or_else(|| RepoError::Unknown(format!("Job {} not found", completion.job_id)))?;
        if job.is_finished() {
            return Ok(vec![]);
        }
        job.finished = Some(completion.finished_at);
        job.success = Some(completion.is_success());
        job.result = completion.audit_record.result.clone();
        job.error = completion.audit_record.error.clone();

        state.last_audit_record_id += 1;
        let record = completion.audit_record.clone().into_record(state.last_audit_record_id);
        state.audit_records.push(record);

        Ok(completion.successors.iter().map(|successor| state.insert_job(successor)).collect())
    }

    async fn has_unfinished_job(
        &self,
        job_type: &str,
        data: &serde_json::Value,
    ) -> Result<bool, RepoError> {
        let state = self.state.lock().await;

        Ok(state
            .jobs
            .values()
            .any(|j| j.job_type == job_type && &j.data == data && !j.is_finished()))
    }

    async fn remove_old_jobs(&self, now: &DateTime<Utc>) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;

        let initial_count = state.jobs.len();
        state.jobs.retain(|_, job| !job.is_removable(now));

        Ok((initial_count - state.jobs.len()) as u64)
    }

    async fn get_audit_records(&self, job_id: JobId) -> Result<Vec<JobAuditRecord>, RepoError> {
        let state = self.state.lock().await;

        Ok(state.audit_records.iter().filter(|r| r.job_id == job_id).cloned().collect())
    }

    async fn cleanup_audit_log(
        &self,
        completed_before: &DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;

        let initial_count = state.audit_records.len();
        state.audit_records.retain(|record| match record.completed_at {
            Some(completed_at) => completed_at >= *completed_before,
            None => true,
        });

        Ok((initial_count - state.audit_records.len()) as u64)
    }
}

#[async_trait::async_trait]
impl NotificationRepo for MemoryRepo {
    async fn create_notification(
        &self,
        notification: &UnsavedNotification,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;

        if !state.idempotency_keys.insert(notification.idempotency_key.clone()) {
            return Ok(false);
        }

        let id = state.notifications.len() as i64 + 1;
        state.notifications.push(Notification {
            id,
            user_id: notification.user_id,
            kind: notification.kind.clone(),
            data: notification.data.clone(),
            idempotency_key: notification.idempotency_key.clone(),
            inserted_at: notification.inserted_at,
        });

        Ok(true)
    }

    async fn get_notifications(&self, user_id: i64) -> Result<Vec<Notification>, RepoError> {
        let state = self.state.lock().await;

        Ok(state.notifications.iter().filter(|n| n.user_id == user_id).cloned().collect())
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryRepo {
    async fn find_user_id_by_wallet(&self, address: &str) -> Result<Option<i64>, RepoError> {
        let state = self.state.lock().await;

        Ok(state.user_wallets.get(&address.to_lowercase()).copied())
    }
}

#[async_trait::async_trait]
impl Repo for MemoryRepo {
    async fn migrate(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::UnsavedJobAuditRecord;

    #[tokio::test]
    async fn cursors_never_move_backward() {
        let repo = MemoryRepo::new();
        let key = CursorKey::new("mainnet", "TokenTransfer");

        repo.set_last_processed_block(&key, 500).await.unwrap();
        repo.set_last_processed_block(&key, 200).await.unwrap();

        assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), Some(500));

        repo.reset_cursor(&key, Some(200)).await.unwrap();
        assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), Some(200));

        repo.reset_cursor(&key, None).await.unwrap();
        assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn claims_a_job_only_once() {
        let repo = MemoryRepo::new();
        let job = UnsavedJob::new("watchChain", serde_json::json!({}));
        let job = repo.create_job(&job).await.unwrap();
        let now = Utc::now();

        assert!(repo.claim_job(job.id, &now).await.unwrap().is_some());
        assert!(repo.claim_job(job.id, &now).await.unwrap().is_none());
        assert!(repo.get_due_jobs(&now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finds_stale_claims_and_finishes_jobs_once() {
        let repo = MemoryRepo::new();
        let job = UnsavedJob::new("watchChain", serde_json::json!({}));
        let stale = repo.create_job(&job).await.unwrap();
        let fresh = repo.create_job(&job).await.unwrap();
        let now = Utc::now();
        let an_hour_ago = now - chrono::Duration::hours(1);
        let stale = repo.claim_job(stale.id, &an_hour_ago).await.unwrap().unwrap();
        repo.claim_job(fresh.id, &now).await.unwrap().unwrap();

        let cutoff = now - chrono::Duration::minutes(5);
        let stale_jobs = repo.get_stale_jobs(&cutoff, 10).await.unwrap();
        assert_eq!(stale_jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![stale.id]);

        let completion = JobCompletion {
            job_id: stale.id,
            finished_at: now,
            audit_record: UnsavedJobAuditRecord::failed(
                &stale,
                an_hour_ago,
                now,
                "Interrupted before completion".to_string(),
            ),
            successors: vec![UnsavedJob::new("watchChain", serde_json::json!({}))],
        };
        assert_eq!(repo.record_job_completion(&completion).await.unwrap().len(), 1);
        assert!(repo.record_job_completion(&completion).await.unwrap().is_empty());

        assert_eq!(repo.get_audit_records(stale.id).await.unwrap().len(), 1);
        assert_eq!(repo.get_all_jobs().await.len(), 3);
        assert!(repo.get_stale_jobs(&cutoff, 10).await.unwrap().is_empty());
    }
}
