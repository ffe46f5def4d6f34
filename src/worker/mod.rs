mod cancellation;
pub mod captions;
pub mod cut_clip;
pub mod merge_av;
pub mod progress;
mod retry;
pub mod shorts;
pub mod style_subtitles;
pub mod translate_subtitles;

pub use cancellation::ensure_not_cancelled;

use crate::api::AppState;
use crate::broker::{task_names, TaskMessage};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus, JobType, MediaAsset};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// A pipeline either completes (leaving the job row in a terminal state
/// itself, since the shape of the output payload differs per job type),
/// observes a cancellation checkpoint, or fails with an error whose
/// message becomes the job's `error` column.
#[derive(Debug)]
pub enum PipelineError {
    Cancelled,
    Other(anyhow::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Cancelled => write!(f, "job was cancelled"),
            PipelineError::Other(err) => write!(f, "{err}"),
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err)
    }
}

impl From<crate::error::ApiError> for PipelineError {
    fn from(err: crate::error::ApiError) -> Self {
        PipelineError::Other(anyhow::Error::from(err))
    }
}

impl From<crate::error::CoreError> for PipelineError {
    fn from(err: crate::error::CoreError) -> Self {
        PipelineError::Other(anyhow::Error::from(err))
    }
}

impl From<crate::error::StorageError> for PipelineError {
    fn from(err: crate::error::StorageError) -> Self {
        PipelineError::Other(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Other(anyhow::Error::from(err))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

fn tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let start = s.len() - max_bytes;
    let boundary = (start..=s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(start);
    s[boundary..].to_string()
}

/// Executes one dispatched task end to end: marks the job running, runs the
/// pipeline named by `message.task_name`, and on failure records the last
/// ~4KB of the error plus a terminal `failed` status. A pipeline's own
/// success path is responsible for its own terminal `completed` transition,
/// since the output payload shape differs per job type.
pub async fn run_pipeline(state: &AppState, message: TaskMessage) {
    if let Err(err) = job_store::transition_status(&state.pool, message.job_id, JobStatus::Running, None).await {
        warn!(job_id = %message.job_id, %err, "failed to mark job running at pipeline start");
    }
    progress::report(state, message.job_id, 0.05, None, Some("accepted")).await;

    let job = match job_store::get_job(&state.pool, message.job_id).await {
        Ok(job) => job,
        Err(err) => {
            error!(job_id = %message.job_id, %err, "job vanished before pipeline could run");
            return;
        }
    };

    let outcome = match message.task_name.as_str() {
        task_names::GENERATE_CAPTIONS => captions::run(state, &job).await,
        task_names::TRANSLATE_SUBTITLES => translate_subtitles::run(state, &job).await,
        task_names::RENDER_STYLED_SUBTITLES => style_subtitles::run(state, &job).await,
        task_names::GENERATE_SHORTS => shorts::run(state, &job).await,
        task_names::MERGE_VIDEO_AUDIO => merge_av::run(state, &job).await,
        task_names::CUT_CLIP => cut_clip::run(state, &job).await,
        other => Err(PipelineError::Other(anyhow::anyhow!("unknown task: {other}"))),
    };

    match outcome {
        Ok(()) => info!(job_id = %message.job_id, job_type = %job_type_label(job.job_type), "pipeline completed"),
        Err(PipelineError::Cancelled) => info!(job_id = %message.job_id, "pipeline stopped at a cancellation checkpoint"),
        Err(PipelineError::Other(err)) => {
            let message_tail = tail(&err.to_string(), 4096);
            error!(job_id = %job.id, error = %message_tail, "pipeline failed");
            if let Err(e) = job_store::finish_job(&state.pool, job.id, JobStatus::Failed, 1.0, None, Some(message_tail), None).await {
                warn!(job_id = %job.id, %e, "failed to record pipeline failure");
            }
        }
    }
}

/// Resolve an input asset's bytes to a local path, downloading HTTP(S) (or
/// presigned-URL-backed remote) URIs into `tmp_dir` first. Local URIs
/// resolve directly against the storage backend's media root.
pub(crate) async fn fetch_input(state: &AppState, asset: &MediaAsset, tmp_dir: &Path) -> PipelineResult<PathBuf> {
    let uri = asset.uri.as_deref().ok_or_else(|| anyhow::anyhow!("asset {} has no stored content", asset.id))?;

    if !crate::storage::is_remote_uri(uri) {
        return Ok(state.storage.resolve_local_path(uri)?);
    }

    let url = if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else {
        state
            .storage
            .get_download_url(uri)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no download url available for {uri}"))?
    };

    let response = reqwest::get(&url).await.map_err(|e| anyhow::anyhow!("failed to download {url}: {e}"))?;
    let bytes = response.bytes().await.map_err(|e| anyhow::anyhow!("failed to read download body for {url}: {e}"))?;

    let ext = Path::new(uri).extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let path = tmp_dir.join(format!("{}.{ext}", Uuid::new_v4()));
    tokio::fs::write(&path, &bytes).await?;
    Ok(path)
}

/// Persists a worker-produced file as a new [`MediaAsset`] under the flat
/// `tmp/` namespace used for derived output, distinct from the
/// `uploads/{kind}/` tree client uploads land in.
pub(crate) async fn store_derived_asset(state: &AppState, kind: &str, source_path: &Path, mime_type: &str, duration: Option<f64>) -> PipelineResult<MediaAsset> {
    let id = Uuid::new_v4();
    let ext = source_path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let filename = format!("{id}.{ext}");
    let uri = state.storage.write_file("tmp", &filename, source_path, Some(mime_type)).await?;
    Ok(crate::store::assets::create_asset(
        &state.pool,
        crate::store::assets::NewMediaAsset { kind: kind.to_string(), uri: Some(uri), mime_type: Some(mime_type.to_string()), duration },
    )
    .await?)
}

/// The primary asset a pipeline reads from, as recorded on the job row at
/// creation time.
pub(crate) async fn primary_asset(state: &AppState, job: &Job) -> PipelineResult<MediaAsset> {
    let asset_id = job.input_asset_id.ok_or_else(|| anyhow::anyhow!("job {} has no input asset", job.id))?;
    Ok(crate::store::assets::get_asset(&state.pool, asset_id).await?)
}

pub(crate) fn asset_id_field(job: &Job, field: &str) -> PipelineResult<Uuid> {
    job.payload
        .get(field)
        .and_then(serde_json::Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| anyhow::anyhow!("job {} payload missing '{field}'", job.id).into())
}

pub(crate) fn job_type_mime(kind: &str) -> &'static str {
    match kind {
        "video" => "video/mp4",
        "audio" => "audio/aac",
        "subtitle" => "application/x-subrip",
        "thumbnail" => "image/png",
        _ => "application/octet-stream",
    }
}

pub(crate) fn job_type_label(job_type: JobType) -> &'static str {
    job_type.as_str()
}
