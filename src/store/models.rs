use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub kind: String,
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Pipeline kind, one per worker task constant in [`crate::broker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Captions,
    TranslateSubtitles,
    StyleSubtitles,
    Shorts,
    MergeAv,
    CutClip,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Captions => "captions",
            JobType::TranslateSubtitles => "translate_subtitles",
            JobType::StyleSubtitles => "style_subtitles",
            JobType::Shorts => "shorts",
            JobType::MergeAv => "merge_av",
            JobType::CutClip => "cut_clip",
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "captions" => Ok(JobType::Captions),
            "translate_subtitles" => Ok(JobType::TranslateSubtitles),
            "style_subtitles" => Ok(JobType::StyleSubtitles),
            "shorts" => Ok(JobType::Shorts),
            "merge_av" => Ok(JobType::MergeAv),
            "cut_clip" => Ok(JobType::CutClip),
            other => Err(format!("unknown job type '{other}'")),
        }
    }
}

/// Row shape read back from sqlite, where `status`/`job_type` are stored as
/// plain TEXT columns rather than native enums.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub job_type: String,
    pub task_id: Option<String>,
    pub status: String,
    pub progress: f64,
    pub error: Option<String>,
    pub payload: String,
    pub input_asset_id: Option<Uuid>,
    pub output_asset_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub task_id: Option<String>,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<String>,
    pub payload: serde_json::Value,
    pub input_asset_id: Option<Uuid>,
    pub output_asset_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            job_type: row.job_type.parse()?,
            task_id: row.task_id,
            status: row.status.parse()?,
            progress: row.progress,
            error: row.error,
            payload: serde_json::from_str(&row.payload).unwrap_or(serde_json::Value::Object(Default::default())),
            input_asset_id: row.input_asset_id,
            output_asset_id: row.output_asset_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubtitleStylePreset {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub style: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
