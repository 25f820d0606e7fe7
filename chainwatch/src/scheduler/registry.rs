use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConfigError;
use crate::jobs::Job;

use super::JobError;

/// Executes every job of one type. `job.data` is the runner's input and the
/// returned value is stored as the job's result.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job) -> Result<serde_json::Value, JobError>;
}

/// Static mapping from job type to runner, built once at startup
#[derive(Clone, Default)]
pub struct JobRegistry {
    runners: HashMap<String, Arc<dyn JobRunner>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, job_type: &str, runner: Arc<dyn JobRunner>) -> Self {
        self.runners.insert(job_type.to_string(), runner);

        self
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobRunner>> {
        self.runners.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.runners.contains_key(job_type)
    }

    pub fn get_job_types(&self) -> Vec<&str> {
        let mut job_types: Vec<_> = self.runners.keys().map(|t| t.as_str()).collect();
        job_types.sort();

        job_types
    }

    /// Fails on the first job type without a runner
    pub fn validate<'a>(
        &self,
        job_types: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ConfigError> {
        match job_types.into_iter().find(|job_type| !self.contains(job_type)) {
            Some(job_type) => Err(ConfigError::UnregisteredJobType(job_type.to_string())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry").field("job_types", &self.get_job_types()).finish()
    }
}
