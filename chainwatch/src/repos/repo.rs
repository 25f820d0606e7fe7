use std::fmt::Debug;

use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::cursors::CursorKey;
use crate::jobs::{Job, JobAuditRecord, JobCompletion, JobId, UnsavedJob};
use crate::notifications::{Notification, UnsavedNotification};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum RepoError {
    #[display("Repo not connected: {_0}")]
    NotConnected(String),
    #[display("Repo error: {_0}")]
    Unknown(String),
}

impl std::error::Error for RepoError {}

/// Durable per-filter progress.
#[async_trait::async_trait]
pub trait CursorRepo: Sync + Send {
    async fn get_last_processed_block(&self, key: &CursorKey) -> Result<Option<u64>, RepoError>;

    /// Never moves an existing cursor backward
    async fn set_last_processed_block(&self, key: &CursorKey, block: u64)
        -> Result<(), RepoError>;

    /// Operator escape hatch: sets the cursor to `block` as is, or deletes it when `None`
    async fn reset_cursor(&self, key: &CursorKey, block: Option<u64>) -> Result<(), RepoError>;
}

#[async_trait::async_trait]
pub trait JobRepo: Sync + Send {
    async fn create_job(&self, job: &UnsavedJob) -> Result<Job, RepoError>;
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepoError>;

    /// Jobs with `due <= now` that nobody claimed yet, oldest `due` first
    async fn get_due_jobs(&self, now: &DateTime<Utc>, limit: i64) -> Result<Vec<Job>, RepoError>;

    /// Sets `started` only when still unset. `None` means another worker won the claim.
    async fn claim_job(&self, id: JobId, now: &DateTime<Utc>) -> Result<Option<Job>, RepoError>;

    /// Claimed jobs still unfinished whose claim started before `claimed_before`,
    /// oldest claim first. Their worker died or lost its store connection.
    async fn get_stale_jobs(
        &self,
        claimed_before: &DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Job>, RepoError>;

    /// Finishes the job, appends its audit record and creates its successors atomically.
    /// Returns the created successors. A job that is already finished is left as is,
    /// with no audit record and no successors.
    async fn record_job_completion(
        &self,
        completion: &JobCompletion,
    ) -> Result<Vec<Job>, RepoError>;

    async fn has_unfinished_job(
        &self,
        job_type: &str,
        data: &serde_json::Value,
    ) -> Result<bool, RepoError>;

    /// Deletes finished jobs whose `remove_at` has passed
    async fn remove_old_jobs(&self, now: &DateTime<Utc>) -> Result<u64, RepoError>;

    async fn get_audit_records(&self, job_id: JobId) -> Result<Vec<JobAuditRecord>, RepoError>;

    /// Deletes audit records with a `completed_at` before the cutoff
    async fn cleanup_audit_log(&self, completed_before: &DateTime<Utc>)
        -> Result<u64, RepoError>;
}

#[async_trait::async_trait]
pub trait NotificationRepo: Sync + Send {
    /// `false` when a notification with the same idempotency key exists
    async fn create_notification(
        &self,
        notification: &UnsavedNotification,
    ) -> Result<bool, RepoError>;
    async fn get_notifications(&self, user_id: i64) -> Result<Vec<Notification>, RepoError>;
}

#[async_trait::async_trait]
pub trait UserRepo: Sync + Send {
    async fn find_user_id_by_wallet(&self, address: &str) -> Result<Option<i64>, RepoError>;
}

#[async_trait::async_trait]
pub trait Repo:
    CursorRepo + JobRepo + NotificationRepo + UserRepo + Clone + Debug + 'static
{
    /// Creates every table the worker owns, if missing
    async fn migrate(&self) -> Result<(), RepoError>;
}

/// What a filter may touch while handling logs.
pub trait FilterRepo: NotificationRepo + UserRepo {}

impl<T: NotificationRepo + UserRepo> FilterRepo for T {}

pub struct SQLikeMigrations;

impl SQLikeMigrations {
    pub fn create_filter_cursors() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS chainwatch_filter_cursors (
                chain_name VARCHAR NOT NULL,
                filter_name VARCHAR NOT NULL,
                last_processed_block BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (chain_name, filter_name)
        )"]
    }

    pub fn create_jobs() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS chainwatch_jobs (
                id BIGSERIAL PRIMARY KEY,
                job_type VARCHAR NOT NULL,
                user_id BIGINT,
                data JSON NOT NULL,
                due TIMESTAMPTZ NOT NULL,
                started TIMESTAMPTZ,
                finished TIMESTAMPTZ,
                success BOOLEAN,
                result JSON,
                error TEXT,
                remove_at TIMESTAMPTZ NOT NULL,
                cron_schedule VARCHAR,
                auto_reschedule_on_failure BOOLEAN NOT NULL DEFAULT FALSE,
                auto_reschedule_on_failure_delay_ms BIGINT NOT NULL DEFAULT 0,
                rescheduled_from_job BIGINT
            )",
            "CREATE INDEX IF NOT EXISTS chainwatch_jobs_due_unstarted_index
            ON chainwatch_jobs(due) WHERE started IS NULL",
            "CREATE INDEX IF NOT EXISTS chainwatch_jobs_remove_at_index
            ON chainwatch_jobs(remove_at) WHERE finished IS NOT NULL",
        ]
    }

    pub fn create_job_audit_records() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS chainwatch_job_audit_records (
                id BIGSERIAL PRIMARY KEY,
                job_id BIGINT NOT NULL,
                job_type VARCHAR NOT NULL,
                user_id BIGINT,
                data JSON NOT NULL,
                result JSON,
                error TEXT,
                status VARCHAR NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                duration_ms BIGINT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS chainwatch_job_audit_records_job_id_index
            ON chainwatch_job_audit_records(job_id)",
            "CREATE INDEX IF NOT EXISTS chainwatch_job_audit_records_completed_at_index
            ON chainwatch_job_audit_records(completed_at)",
        ]
    }

    pub fn create_notifications() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS chainwatch_notifications (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                kind VARCHAR NOT NULL,
                data JSON NOT NULL,
                idempotency_key VARCHAR NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS chainwatch_notifications_idempotency_key_index
            ON chainwatch_notifications(idempotency_key)",
            "CREATE INDEX IF NOT EXISTS chainwatch_notifications_user_id_index
            ON chainwatch_notifications(user_id)",
        ]
    }

    pub fn create_user_wallets() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS chainwatch_user_wallets (
                address VARCHAR PRIMARY KEY,
                user_id BIGINT NOT NULL
        )"]
    }

    pub fn get_all() -> Vec<&'static str> {
        [
            Self::create_filter_cursors(),
            Self::create_jobs(),
            Self::create_job_audit_records(),
            Self::create_notifications(),
            Self::create_user_wallets(),
        ]
        .concat()
    }
}
