use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::jobs::to_chrono_duration;

/// Finished jobs stay this long past their `due` before purging. Unit in seconds.
pub const JOB_RETENTION_WINDOW_SECS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct RetentionConfig {
    /// Gap between a job's `due` and its `remove_at`.
    pub job_retention_window: Duration,
    /// Retains audit records completed within the max age specified.
    pub audit_log_max_age: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_retention_window: Duration::from_secs(JOB_RETENTION_WINDOW_SECS),
            audit_log_max_age: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
        }
    }
}

impl RetentionConfig {
    /// Audit records completed before the returned instant are purgeable
    pub fn get_audit_log_cutoff(&self, now: &DateTime<Utc>) -> DateTime<Utc> {
        *now - to_chrono_duration(self.audit_log_max_age)
    }
}
