mod audit_record;
mod cron_schedule;
mod job;

pub use audit_record::{JobAuditRecord, JobStatus, UnsavedJobAuditRecord};
pub use cron_schedule::{CronSchedule, InvalidCronSchedule};
pub use job::{Job, JobCompletion, JobId, UnsavedJob};
pub(crate) use job::to_chrono_duration;

/// Polls every configured chain for new filter logs
pub const WATCH_CHAIN_JOB: &str = "watchChain";
/// Purges finished jobs whose `remove_at` has passed
pub const REMOVE_OLD_WORKER_JOBS_JOB: &str = "removeOldWorkerJobs";
/// Purges completed audit records older than the configured max age
pub const CLEANUP_AUDIT_LOG_JOB: &str = "cleanupAuditLog";

/// Input of a `watchChain` job
pub fn watch_chain_job_data(chain_name: &str) -> serde_json::Value {
    serde_json::json!({ "chain": chain_name })
}
