use super::{Broker, ProgressUpdate, TaskMessage};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// `tokio::mpsc`-backed broker for tests and offline/single-binary
/// deployments where a real NATS server isn't available.
pub struct InMemoryBroker {
    jobs_tx: mpsc::UnboundedSender<TaskMessage>,
    jobs_rx: Mutex<mpsc::UnboundedReceiver<TaskMessage>>,
    progress_tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl InMemoryBroker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        (Self { jobs_tx, jobs_rx: Mutex::new(jobs_rx), progress_tx }, progress_rx)
    }

    pub async fn recv_job(&self) -> Option<TaskMessage> {
        self.jobs_rx.lock().await.recv().await
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish_job(&self, task_name: &str, job_id: Uuid, args: Value) -> anyhow::Result<String> {
        let task_id = Uuid::new_v4().to_string();
        self.jobs_tx.send(TaskMessage { task_id: task_id.clone(), task_name: task_name.to_string(), job_id, args })?;
        Ok(task_id)
    }

    async fn publish_progress(&self, update: ProgressUpdate) -> anyhow::Result<()> {
        self.progress_tx.send(update)?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}
