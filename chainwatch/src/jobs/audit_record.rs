use chrono::{DateTime, Utc};
use derive_more::Display;
use diesel::{Insertable, Queryable};

use crate::diesel::schema::chainwatch_job_audit_records;

use super::{Job, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobStatus {
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// N/B: The order has to match ./diesel.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Queryable)]
#[diesel(table_name = chainwatch_job_audit_records)]
pub struct JobAuditRecord {
    pub id: i64,
    pub job_id: JobId,
    pub job_type: String,
    pub user_id: Option<i64>,
    pub data: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    /// Only absent for records written by an interrupted worker
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

impl JobAuditRecord {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = chainwatch_job_audit_records)]
pub struct UnsavedJobAuditRecord {
    pub job_id: JobId,
    pub job_type: String,
    pub user_id: Option<i64>,
    pub data: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

impl UnsavedJobAuditRecord {
    pub fn completed(
        job: &Job,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: serde_json::Value,
    ) -> Self {
        Self::new(job, JobStatus::Completed, started_at, completed_at)
            .with_result(Some(result), None)
    }

    pub fn failed(
        job: &Job,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        error: String,
    ) -> Self {
        Self::new(job, JobStatus::Failed, started_at, completed_at).with_result(None, Some(error))
    }

    fn new(
        job: &Job,
        status: JobStatus,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type.clone(),
            user_id: job.user_id,
            data: job.data.clone(),
            result: None,
            error: None,
            status: status.to_string(),
            started_at,
            completed_at: Some(completed_at),
            duration_ms: (completed_at - started_at).num_milliseconds().max(0),
        }
    }

    fn with_result(mut self, result: Option<serde_json::Value>, error: Option<String>) -> Self {
        self.result = result;
        self.error = error;

        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed.as_str()
    }

    pub(crate) fn into_record(self, id: i64) -> JobAuditRecord {
        JobAuditRecord {
            id,
            job_id: self.job_id,
            job_type: self.job_type,
            user_id: self.user_id,
            data: self.data,
            result: self.result,
            error: self.error,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_ms: self.duration_ms,
        }
    }
}
