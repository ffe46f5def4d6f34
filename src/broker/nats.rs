use super::{Broker, ProgressUpdate, TaskMessage};
use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

const JOBS_SUBJECT: &str = "reframe.jobs";
const PROGRESS_SUBJECT: &str = "reframe.progress";
const PING_SUBJECT: &str = "reframe.ping";

/// Publishes job dispatch and progress messages over NATS subjects. Each
/// job is a fire-and-forget publish; the worker pool subscribes to
/// [`JOBS_SUBJECT`] and acks by writing job status directly to the store.
pub struct NatsBroker {
    client: Client,
}

impl NatsBroker {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client })
    }

    /// Subscribe to dispatched [`TaskMessage`]s. The worker runtime pulls from
    /// this subscription and hands each message to `worker::run_pipeline`.
    pub async fn subscribe_jobs(&self) -> anyhow::Result<Subscriber> {
        Ok(self.client.subscribe(JOBS_SUBJECT).await?)
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn publish_job(&self, task_name: &str, job_id: Uuid, args: Value) -> anyhow::Result<String> {
        let task_id = Uuid::new_v4().to_string();
        let message = TaskMessage { task_id: task_id.clone(), task_name: task_name.to_string(), job_id, args };
        let payload = serde_json::to_vec(&message)?;
        self.client.publish(JOBS_SUBJECT, payload.into()).await?;
        Ok(task_id)
    }

    async fn publish_progress(&self, update: ProgressUpdate) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&update)?;
        self.client.publish(PROGRESS_SUBJECT, payload.into()).await?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<bool> {
        self.client.publish(PING_SUBJECT, "ping".into()).await?;
        self.client.flush().await?;
        Ok(true)
    }
}
