use super::{ensure_not_cancelled, fetch_input, primary_asset, store_derived_asset, PipelineResult};
use crate::api::AppState;
use crate::ffmpeg::{cut_clip as ffmpeg_cut_clip, default_runner};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus};
use serde_json::Value;
use tempfile::tempdir;

/// `tasks.cut_clip`: stream-copy a `[start, end)` window out of the video
/// with no re-encoding.
pub async fn run(state: &AppState, job: &Job) -> PipelineResult<()> {
    ensure_not_cancelled(state, job.id).await?;
    let asset = primary_asset(state, job).await?;

    let start = job.payload.get("start").and_then(Value::as_f64).ok_or_else(|| anyhow::anyhow!("job {} payload missing 'start'", job.id))?;
    let end = job.payload.get("end").and_then(Value::as_f64).ok_or_else(|| anyhow::anyhow!("job {} payload missing 'end'", job.id))?;
    if end <= start {
        return Err(anyhow::anyhow!("cut_clip requires end > start, got start={start} end={end}").into());
    }

    let tmp = tempdir()?;
    let video_path = fetch_input(state, &asset, tmp.path()).await?;

    super::progress::report(state, job.id, 0.4, None, Some("cutting")).await;

    let out_path = tmp.path().join("clip.mp4");
    ffmpeg_cut_clip(&video_path, start, end, &out_path, default_runner().as_ref())
        .await
        .map_err(|e| anyhow::anyhow!("failed to cut clip: {e}"))?;

    ensure_not_cancelled(state, job.id).await?;
    let output_asset = store_derived_asset(state, "video", &out_path, super::job_type_mime("video"), Some(end - start)).await?;

    job_store::finish_job(&state.pool, job.id, JobStatus::Completed, 1.0, None, None, Some(output_asset.id)).await?;
    Ok(())
}
