mod in_memory;
mod nats;

pub use in_memory::InMemoryBroker;
pub use nats::NatsBroker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Task name constants, matching the Celery task names in the source
/// worker 1:1 so dispatch payloads stay self-describing across the wire.
pub mod task_names {
    pub const PING: &str = "tasks.ping";
    pub const ECHO: &str = "tasks.echo";
    pub const GENERATE_CAPTIONS: &str = "tasks.generate_captions";
    pub const TRANSLATE_SUBTITLES: &str = "tasks.translate_subtitles";
    pub const RENDER_STYLED_SUBTITLES: &str = "tasks.render_styled_subtitles";
    pub const GENERATE_SHORTS: &str = "tasks.generate_shorts";
    pub const MERGE_VIDEO_AUDIO: &str = "tasks.merge_video_audio";
    pub const CUT_CLIP: &str = "tasks.cut_clip";
    /// Worker fleet self-report. No executor currently answers this task;
    /// `system_status` only ever observes the fire-and-forget `PING` reply.
    pub const SYSTEM_INFO: &str = "tasks.system_info";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: String,
    pub task_name: String,
    pub job_id: Uuid,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: Uuid,
    pub progress: f64,
    pub message: Option<String>,
}

/// Dispatches pipeline work and progress events between the API and the
/// worker pool. `publish_job` returns the broker-assigned task id that the
/// API layer records on the job row via `attach_task_id`.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish_job(&self, task_name: &str, job_id: Uuid, args: Value) -> anyhow::Result<String>;
    async fn publish_progress(&self, update: ProgressUpdate) -> anyhow::Result<()>;
    /// `tasks.ping` round-trip, used by `GET /system/status`.
    async fn ping(&self) -> anyhow::Result<bool>;
}
