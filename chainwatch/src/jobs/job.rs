use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable};
use serde::Deserialize;

use crate::diesel::schema::chainwatch_jobs;
use crate::retention::JOB_RETENTION_WINDOW_SECS;

use super::UnsavedJobAuditRecord;

pub type JobId = i64;

/// N/B: The order has to match ./diesel.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Deserialize, Queryable)]
#[diesel(table_name = chainwatch_jobs)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    /// `None` (or 0) for system jobs
    pub user_id: Option<i64>,
    pub data: serde_json::Value,
    pub due: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub remove_at: DateTime<Utc>,
    pub cron_schedule: Option<String>,
    pub auto_reschedule_on_failure: bool,
    pub(crate) auto_reschedule_on_failure_delay_ms: i64,
    pub rescheduled_from_job: Option<JobId>,
}

impl Job {
    pub fn is_due(&self, now: &DateTime<Utc>) -> bool {
        self.due <= *now && self.started.is_none()
    }

    pub fn is_claimed(&self) -> bool {
        self.started.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn is_system_job(&self) -> bool {
        matches!(self.user_id, None | Some(0))
    }

    pub fn is_removable(&self, now: &DateTime<Utc>) -> bool {
        self.is_finished() && self.remove_at < *now
    }

    pub fn get_auto_reschedule_on_failure_delay(&self) -> Duration {
        Duration::from_millis(self.auto_reschedule_on_failure_delay_ms.max(0) as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = chainwatch_jobs)]
pub struct UnsavedJob {
    pub job_type: String,
    pub user_id: Option<i64>,
    pub data: serde_json::Value,
    pub due: DateTime<Utc>,
    pub remove_at: DateTime<Utc>,
    pub cron_schedule: Option<String>,
    pub auto_reschedule_on_failure: bool,
    auto_reschedule_on_failure_delay_ms: i64,
    pub rescheduled_from_job: Option<JobId>,
}

impl UnsavedJob {
    /// A system job due now, removable one retention window after it is due
    pub fn new(job_type: &str, data: serde_json::Value) -> Self {
        let due = Utc::now();

        Self {
            job_type: job_type.to_string(),
            user_id: None,
            data,
            due,
            remove_at: due + chrono::Duration::seconds(JOB_RETENTION_WINDOW_SECS as i64),
            cron_schedule: None,
            auto_reschedule_on_failure: false,
            auto_reschedule_on_failure_delay_ms: 0,
            rescheduled_from_job: None,
        }
    }

    /// The next instance of `job`, inheriting its type, owner, data and scheduling options
    pub fn successor_of(job: &Job, due: DateTime<Utc>, retention: Duration) -> Self {
        Self {
            job_type: job.job_type.clone(),
            user_id: job.user_id,
            data: job.data.clone(),
            due,
            remove_at: due + to_chrono_duration(retention),
            cron_schedule: job.cron_schedule.clone(),
            auto_reschedule_on_failure: job.auto_reschedule_on_failure,
            auto_reschedule_on_failure_delay_ms: job.auto_reschedule_on_failure_delay_ms,
            rescheduled_from_job: Some(job.id),
        }
    }

    /// Moves `due`, keeping the gap to `remove_at`
    pub fn due_at(mut self, due: DateTime<Utc>) -> Self {
        let retention = self.remove_at - self.due;
        self.due = due;
        self.remove_at = due + retention;

        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.remove_at = self.due + to_chrono_duration(retention);

        self
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);

        self
    }

    pub fn with_cron_schedule(mut self, cron_schedule: &str) -> Self {
        self.cron_schedule = Some(cron_schedule.to_string());

        self
    }

    pub fn with_auto_reschedule_on_failure(mut self, delay: Duration) -> Self {
        self.auto_reschedule_on_failure = true;
        self.auto_reschedule_on_failure_delay_ms = delay.as_millis() as i64;

        self
    }

    pub fn get_auto_reschedule_on_failure_delay(&self) -> Duration {
        Duration::from_millis(self.auto_reschedule_on_failure_delay_ms.max(0) as u64)
    }

    /// Materializes the job as the store would, used by the in-memory repo
    pub(crate) fn into_job(self, id: JobId) -> Job {
        Job {
            id,
            job_type: self.job_type,
            user_id: self.user_id,
            data: self.data,
            due: self.due,
            started: None,
            finished: None,
            success: None,
            result: None,
            error: None,
            remove_at: self.remove_at,
            cron_schedule: self.cron_schedule,
            auto_reschedule_on_failure: self.auto_reschedule_on_failure,
            auto_reschedule_on_failure_delay_ms: self.auto_reschedule_on_failure_delay_ms,
            rescheduled_from_job: self.rescheduled_from_job,
        }
    }
}

/// Everything recorded when a claimed job stops running.
/// Stores apply it in one transaction.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub job_id: JobId,
    pub finished_at: DateTime<Utc>,
    pub audit_record: UnsavedJobAuditRecord,
    pub successors: Vec<UnsavedJob>,
}

impl JobCompletion {
    pub fn is_success(&self) -> bool {
        self.audit_record.is_completed()
    }
}

pub(crate) fn to_chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_jobs_are_removable_one_hour_after_due() {
        let job = UnsavedJob::new("watchChain", serde_json::json!({}));

        assert_eq!((job.remove_at - job.due).num_seconds(), 3_600);
    }

    #[test]
    fn moving_due_keeps_retention_gap() {
        let due = Utc::now() + chrono::Duration::minutes(5);
        let job = UnsavedJob::new("watchChain", serde_json::json!({}))
            .with_retention(Duration::from_secs(60))
            .due_at(due);

        assert_eq!(job.due, due);
        assert_eq!(job.remove_at, due + chrono::Duration::seconds(60));
    }
}
