use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::error;

/// Handle to the running scheduler loop
pub struct WorkerTask {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl WorkerTask {
    pub fn new(task: JoinHandle<()>, shutdown: watch::Sender<bool>) -> Self {
        WorkerTask { task, shutdown }
    }

    /// Lets the in-flight tick finish, then waits for the loop to exit.
    /// Errs when the loop panicked or was cancelled.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        // Fails only when the loop already exited
        let _ = self.shutdown.send(true);

        self.task.await.inspect_err(|join_error| {
            error!("Worker task ended abnormally: {join_error}");
        })
    }
}
