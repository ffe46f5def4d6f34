use super::{ensure_not_cancelled, fetch_input, primary_asset, store_derived_asset, PipelineResult};
use crate::api::AppState;
use crate::domain::{equal_splits, select_top, SegmentCandidate};
use crate::ffmpeg::{cut_clip, default_runner, detect_silence, probe_media, Invocation, ReframeStrategy};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus};
use serde_json::{json, Value};
use tempfile::tempdir;

const SILENCE_NOISE_THRESHOLD_DB: f64 = -30.0;
const SILENCE_MIN_DURATION_SECONDS: f64 = 0.3;

/// Trim leading/trailing silence off a candidate's window: if the window
/// opens inside a detected silent interval, advance `start` to that
/// interval's end; if it closes inside one, retreat `end` to that
/// interval's start. Never trims past the candidate's own bounds and never
/// below a zero-length result.
fn trim_silence_from_candidate(candidate: &SegmentCandidate, silences: &[crate::ffmpeg::SilenceInterval]) -> SegmentCandidate {
    let mut start = candidate.start;
    let mut end = candidate.end;

    for silence in silences {
        if silence.start <= start && silence.end > start && silence.end < end {
            start = silence.end;
        }
    }
    for silence in silences {
        if silence.end >= end && silence.start < end && silence.start > start {
            end = silence.start;
        }
    }

    SegmentCandidate { start, end, ..candidate.clone() }
}

/// A single-pixel PNG, used as the thumbnail fallback when the frame-grab
/// invocation fails — a clip without a thumbnail shouldn't sink the whole
/// job.
const FALLBACK_THUMBNAIL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00,
    0x00, 0x00, 0x03, 0x00, 0x01, 0x71, 0x55, 0xB1, 0x48, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Linearly decaying score favoring earlier candidates — with no transcript
/// to drive heuristic/LLM scoring here, an equal-split timeline has no
/// other signal to rank by.
fn score_by_position(candidates: Vec<SegmentCandidate>) -> Vec<SegmentCandidate> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, mut c)| {
            c.score = (1.0 - 0.01 * i as f64).max(0.0);
            c
        })
        .collect()
}

async fn grab_thumbnail(video: &std::path::Path, at_second: f64, out: &std::path::Path) -> bool {
    let invocation = Invocation::new(
        "ffmpeg",
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            at_second.to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            "scale=320:-1".to_string(),
            out.display().to_string(),
        ],
    );
    default_runner().run(&invocation).await.is_ok()
}

/// `tasks.generate_shorts`: split a video into candidate clips, keep the
/// best-scoring non-overlapping subset, and cut each one into its own
/// output asset with a thumbnail.
pub async fn run(state: &AppState, job: &Job) -> PipelineResult<()> {
    ensure_not_cancelled(state, job.id).await?;
    let asset = primary_asset(state, job).await?;

    let tmp = tempdir()?;
    let video_path = fetch_input(state, &asset, tmp.path()).await?;

    let probe = probe_media(&video_path, default_runner().as_ref()).await.map_err(|e| anyhow::anyhow!("failed to probe video: {e}"))?;

    let max_clips = job.payload.get("max_clips").and_then(Value::as_u64).unwrap_or(5) as usize;
    let min_duration = job.payload.get("min_duration").and_then(Value::as_f64).unwrap_or(15.0);
    let max_duration = job.payload.get("max_duration").and_then(Value::as_f64).unwrap_or(60.0);
    let aspect_ratio = job.payload.get("aspect_ratio").and_then(Value::as_str).map(str::to_string);
    let trim_silence = job.payload.get("options").and_then(|o| o.get("trim_silence")).and_then(Value::as_bool).unwrap_or(false);

    let candidates = score_by_position(equal_splits(probe.duration, max_duration));
    let mut selected = select_top(&candidates, max_clips, min_duration, max_duration, 1.0);
    if selected.is_empty() && !candidates.is_empty() {
        selected = candidates.into_iter().take(max_clips).collect();
    }

    if trim_silence && !selected.is_empty() {
        if let Ok(silences) = detect_silence(&video_path, SILENCE_NOISE_THRESHOLD_DB, SILENCE_MIN_DURATION_SECONDS, default_runner().as_ref()).await {
            selected = selected
                .iter()
                .map(|c| {
                    let trimmed = trim_silence_from_candidate(c, &silences);
                    if trimmed.duration() >= min_duration { trimmed } else { c.clone() }
                })
                .collect();
        }
    }

    super::progress::report(state, job.id, 0.2, None, Some("cutting clips")).await;

    let mut clip_assets = Vec::with_capacity(selected.len());
    let total = selected.len().max(1);
    for (index, candidate) in selected.iter().enumerate() {
        ensure_not_cancelled(state, job.id).await?;

        let clip_path = tmp.path().join(format!("clip_{index}.mp4"));
        cut_clip(&video_path, candidate.start, candidate.end, &clip_path, default_runner().as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("failed to cut clip {index}: {e}"))?;

        let final_path = if let Some(ratio) = &aspect_ratio {
            let reframed_path = tmp.path().join(format!("clip_{index}_reframed.mp4"));
            crate::ffmpeg::reframe(&clip_path, &reframed_path, ratio, ReframeStrategy::Crop, default_runner().as_ref())
                .await
                .map_err(|e| anyhow::anyhow!("failed to reframe clip {index}: {e}"))?;
            reframed_path
        } else {
            clip_path
        };

        let clip_asset = store_derived_asset(state, "video", &final_path, super::job_type_mime("video"), Some(candidate.duration())).await?;

        let thumbnail_path = tmp.path().join(format!("clip_{index}_thumb.png"));
        let thumbnail_asset = if grab_thumbnail(&final_path, 0.5, &thumbnail_path).await {
            Some(store_derived_asset(state, "thumbnail", &thumbnail_path, super::job_type_mime("thumbnail"), None).await?)
        } else {
            tokio::fs::write(&thumbnail_path, FALLBACK_THUMBNAIL_PNG).await?;
            Some(store_derived_asset(state, "thumbnail", &thumbnail_path, super::job_type_mime("thumbnail"), None).await?)
        };

        clip_assets.push(json!({
            "asset_id": clip_asset.id,
            "thumbnail_asset_id": thumbnail_asset.map(|a| a.id),
            "start": candidate.start,
            "end": candidate.end,
            "duration": candidate.duration(),
            "score": candidate.score,
            "uri": clip_asset.uri,
            "title": format!("Clip {}", index + 1),
        }));

        super::progress::report(state, job.id, 0.2 + 0.7 * (index as f64 + 1.0) / total as f64, None, None).await;
    }

    let payload_patch = json!({"clip_assets": clip_assets, "clip_count": clip_assets.len()});
    job_store::finish_job(&state.pool, job.id, JobStatus::Completed, 1.0, Some(payload_patch), None, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::SilenceInterval;

    #[test]
    fn advances_start_past_leading_silence() {
        let candidate = SegmentCandidate::new(0.0, 4.0);
        let silences = vec![SilenceInterval { start: 0.0, end: 1.2 }];
        let trimmed = trim_silence_from_candidate(&candidate, &silences);
        assert_eq!(trimmed.start, 1.2);
        assert_eq!(trimmed.end, 4.0);
    }

    #[test]
    fn retreats_end_before_trailing_silence() {
        let candidate = SegmentCandidate::new(0.0, 4.0);
        let silences = vec![SilenceInterval { start: 3.0, end: 4.0 }];
        let trimmed = trim_silence_from_candidate(&candidate, &silences);
        assert_eq!(trimmed.start, 0.0);
        assert_eq!(trimmed.end, 3.0);
    }

    #[test]
    fn leaves_candidate_untouched_with_no_silence_at_its_edges() {
        let candidate = SegmentCandidate::new(1.0, 3.0);
        let silences = vec![SilenceInterval { start: 3.5, end: 4.0 }];
        let trimmed = trim_silence_from_candidate(&candidate, &silences);
        assert_eq!(trimmed, candidate);
    }

    #[test]
    fn ignores_a_silence_interval_spanning_the_whole_candidate() {
        let candidate = SegmentCandidate::new(1.0, 2.0);
        let silences = vec![SilenceInterval { start: 0.0, end: 3.0 }];
        let trimmed = trim_silence_from_candidate(&candidate, &silences);
        assert_eq!(trimmed, candidate);
    }
}
