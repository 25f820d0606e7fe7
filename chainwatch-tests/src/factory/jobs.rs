use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chainwatch::{Job, JobError, JobRunner};
use chrono::{DateTime, DurationRound, Utc};

/// Counts runs and answers with a fixed outcome
#[derive(Clone)]
pub struct StubRunner {
    outcome: Result<serde_json::Value, JobError>,
    delay: Option<Duration>,
    runs: Arc<AtomicUsize>,
}

impl StubRunner {
    pub fn succeeding(result: serde_json::Value) -> Self {
        Self {
            outcome: Ok(result),
            delay: None,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(job_error: JobError) -> Self {
        Self {
            outcome: Err(job_error),
            ..Self::succeeding(serde_json::Value::Null)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);

        self
    }

    pub fn get_runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl JobRunner for StubRunner {
    async fn run(&self, _job: &Job) -> Result<serde_json::Value, JobError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.outcome.clone()
    }
}

/// The latest instant at or before now that is a whole multiple of `seconds`
pub fn aligned_now(seconds: i64) -> DateTime<Utc> {
    Utc::now().duration_trunc(chrono::Duration::seconds(seconds)).unwrap()
}

/// Panics on every run
pub struct PanickingRunner;

#[async_trait::async_trait]
impl JobRunner for PanickingRunner {
    async fn run(&self, _job: &Job) -> Result<serde_json::Value, JobError> {
        panic!("division by zero")
    }
}
