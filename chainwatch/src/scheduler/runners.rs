use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::jobs::Job;
use crate::poller::Poller;
use crate::repos::Repo;
use crate::retention::RetentionConfig;

use super::{JobError, JobRunner};

#[derive(Debug, Deserialize)]
struct WatchChainData {
    chain: String,
}

/// Runs one poll cycle for the chain named in `{"chain": <name>}`
pub struct WatchChainRunner<R: Repo> {
    pollers_by_chain: HashMap<String, Arc<Poller<R>>>,
}

impl<R: Repo> WatchChainRunner<R> {
    pub fn new(pollers: Vec<Arc<Poller<R>>>) -> Self {
        Self {
            pollers_by_chain: pollers
                .into_iter()
                .map(|poller| (poller.get_chain().name.clone(), poller))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl<R: Repo> JobRunner for WatchChainRunner<R> {
    async fn run(&self, job: &Job) -> Result<serde_json::Value, JobError> {
        let WatchChainData { chain } = serde_json::from_value(job.data.clone())
            .map_err(|error| JobError::MalformedData(error.to_string()))?;

        let poller = self
            .pollers_by_chain
            .get(&chain)
            .ok_or_else(|| JobError::MalformedData(format!("Unknown chain `{chain}`")))?;

        let report = poller.poll().await?;

        serde_json::to_value(report).map_err(|error| JobError::Failed(error.to_string()))
    }
}

/// Purges finished jobs past their `remove_at`
pub struct RemoveOldWorkerJobsRunner<R: Repo> {
    repo: Arc<R>,
}

impl<R: Repo> RemoveOldWorkerJobsRunner<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait::async_trait]
impl<R: Repo> JobRunner for RemoveOldWorkerJobsRunner<R> {
    async fn run(&self, _job: &Job) -> Result<serde_json::Value, JobError> {
        let removed = self.repo.remove_old_jobs(&Utc::now()).await?;

        Ok(json!({ "removed": removed }))
    }
}

/// Purges completed audit records older than the configured max age
pub struct CleanupAuditLogRunner<R: Repo> {
    repo: Arc<R>,
    retention_config: RetentionConfig,
}

impl<R: Repo> CleanupAuditLogRunner<R> {
    pub fn new(repo: Arc<R>, retention_config: RetentionConfig) -> Self {
        Self {
            repo,
            retention_config,
        }
    }
}

#[async_trait::async_trait]
impl<R: Repo> JobRunner for CleanupAuditLogRunner<R> {
    async fn run(&self, _job: &Job) -> Result<serde_json::Value, JobError> {
        let cutoff = self.retention_config.get_audit_log_cutoff(&Utc::now());
        let removed = self.repo.cleanup_audit_log(&cutoff).await?;

        Ok(json!({ "removed": removed, "completedBefore": cutoff }))
    }
}
