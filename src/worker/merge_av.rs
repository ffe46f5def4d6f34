use super::{asset_id_field, ensure_not_cancelled, fetch_input, primary_asset, store_derived_asset, PipelineResult};
use crate::api::AppState;
use crate::ffmpeg::{default_runner, merge_video_audio, probe_media, Ducking};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus};
use serde_json::Value;
use tempfile::tempdir;

fn parse_ducking(value: &Value) -> Option<Ducking> {
    match value {
        Value::Bool(true) => Some(Ducking::Default),
        Value::Bool(false) | Value::Null => None,
        Value::Number(n) => n.as_f64().map(Ducking::Level),
        _ => None,
    }
}

/// `tasks.merge_video_audio`: lay an external audio track onto a video,
/// mixing it under the video's own audio (if any) rather than replacing it
/// outright.
pub async fn run(state: &AppState, job: &Job) -> PipelineResult<()> {
    ensure_not_cancelled(state, job.id).await?;
    let video_asset = primary_asset(state, job).await?;
    let audio_asset_id = asset_id_field(job, "audio_asset_id")?;
    let audio_asset = crate::store::assets::get_asset(&state.pool, audio_asset_id).await?;

    let tmp = tempdir()?;
    let video_path = fetch_input(state, &video_asset, tmp.path()).await?;
    let audio_path = fetch_input(state, &audio_asset, tmp.path()).await?;

    let probe = probe_media(&video_path, default_runner().as_ref()).await.map_err(|e| anyhow::anyhow!("failed to probe video: {e}"))?;
    let video_has_audio = !probe.audio_codecs.is_empty();

    let offset = job.payload.get("offset").and_then(Value::as_f64).unwrap_or(0.0);
    let ducking = job.payload.get("ducking").and_then(parse_ducking);
    let normalize = job.payload.get("normalize").and_then(Value::as_bool).unwrap_or(false);

    ensure_not_cancelled(state, job.id).await?;
    super::progress::report(state, job.id, 0.4, None, Some("merging audio")).await;

    let out_path = tmp.path().join("merged.mp4");
    merge_video_audio(&video_path, &audio_path, &out_path, offset, ducking, normalize, video_has_audio, default_runner().as_ref())
        .await
        .map_err(|e| anyhow::anyhow!("failed to merge audio: {e}"))?;

    ensure_not_cancelled(state, job.id).await?;
    let output_asset = store_derived_asset(state, "video", &out_path, super::job_type_mime("video"), Some(probe.duration)).await?;

    job_store::finish_job(&state.pool, job.id, JobStatus::Completed, 1.0, None, None, Some(output_asset.id)).await?;
    Ok(())
}
