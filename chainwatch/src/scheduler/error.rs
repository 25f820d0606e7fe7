use std::time::Duration;

use derive_more::Display;

use crate::jobs::InvalidCronSchedule;
use crate::poller::PollerError;
use crate::repos::RepoError;

/// Why a job run did not complete
#[derive(Debug, Display, Clone, PartialEq)]
pub enum JobError {
    #[display("No runner registered for job type `{_0}`")]
    UnknownJobType(String),
    #[display("Malformed job data: {_0}")]
    MalformedData(String),
    #[display("Timed out after {}ms", _0.as_millis())]
    TimedOut(Duration),
    /// The worker holding the claim stopped before recording an outcome
    #[display("Interrupted before completion")]
    Interrupted,
    #[display("{_0}")]
    Failed(String),
}

impl JobError {
    /// Permanent failures would fail the same way again, so they are never retried
    pub fn is_permanent(&self) -> bool {
        matches!(self, JobError::UnknownJobType(_) | JobError::MalformedData(_))
    }
}

impl std::error::Error for JobError {}

impl From<RepoError> for JobError {
    fn from(value: RepoError) -> Self {
        JobError::Failed(value.to_string())
    }
}

impl From<PollerError> for JobError {
    fn from(value: PollerError) -> Self {
        JobError::Failed(value.to_string())
    }
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum SchedulerError {
    #[display("{_0}")]
    Repo(RepoError),
    #[display("{_0}")]
    InvalidCronSchedule(InvalidCronSchedule),
}

impl std::error::Error for SchedulerError {}

impl From<RepoError> for SchedulerError {
    fn from(value: RepoError) -> Self {
        SchedulerError::Repo(value)
    }
}

impl From<InvalidCronSchedule> for SchedulerError {
    fn from(value: InvalidCronSchedule) -> Self {
        SchedulerError::InvalidCronSchedule(value)
    }
}
