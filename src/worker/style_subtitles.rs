use super::{asset_id_field, ensure_not_cancelled, fetch_input, primary_asset, store_derived_asset, PipelineResult};
use crate::api::AppState;
use crate::domain::serialize::{parse_srt, parse_vtt, to_ass_karaoke};
use crate::ffmpeg::{burn_subtitles_args, default_runner, Invocation};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus};
use serde_json::{json, Value};
use tempfile::tempdir;

/// Escape a path for ffmpeg's `subtitles`/`ass` filter, which treats `:`,
/// `'`, and `\` specially inside the filtergraph string.
fn escape_filter_path(path: &std::path::Path) -> String {
    path.display().to_string().replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

fn escape_style_value(value: &str) -> String {
    value.replace(',', "\\,")
}

/// Build an ASS `force_style` string from a `{key: value}` style object,
/// e.g. `{"Fontname": "Arial", "Fontsize": 28}` becomes
/// `Fontname=Arial,Fontsize=28`. Keys are passed through verbatim; callers
/// are expected to use the ASS style field names libass understands.
fn compose_force_style(style: &Value) -> Option<String> {
    let map = style.as_object()?;
    if map.is_empty() {
        return None;
    }
    let pairs: Vec<String> = map
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{key}={}", escape_style_value(&rendered))
        })
        .collect();
    Some(pairs.join(","))
}

/// `tasks.render_styled_subtitles`: burn a subtitle track into a video with
/// an optional styling override, producing either a full-length render or a
/// short preview clip.
pub async fn run(state: &AppState, job: &Job) -> PipelineResult<()> {
    ensure_not_cancelled(state, job.id).await?;
    let video_asset = primary_asset(state, job).await?;
    let subtitle_asset_id = asset_id_field(job, "subtitle_asset_id")?;
    let subtitle_asset = crate::store::assets::get_asset(&state.pool, subtitle_asset_id).await?;

    let tmp = tempdir()?;
    let video_path = fetch_input(state, &video_asset, tmp.path()).await?;
    let subtitle_path = fetch_input(state, &subtitle_asset, tmp.path()).await?;

    super::progress::report(state, job.id, 0.2, None, Some("preparing subtitles")).await;

    let ext = subtitle_path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    let ass_path = tmp.path().join("styled.ass");
    match ext.as_str() {
        "ass" => {
            tokio::fs::copy(&subtitle_path, &ass_path).await?;
        }
        "vtt" => {
            let raw = tokio::fs::read_to_string(&subtitle_path).await?;
            let lines = parse_vtt(&raw)?;
            tokio::fs::write(&ass_path, to_ass_karaoke(&lines)).await?;
        }
        _ => {
            let raw = tokio::fs::read_to_string(&subtitle_path).await?;
            let lines = parse_srt(&raw)?;
            tokio::fs::write(&ass_path, to_ass_karaoke(&lines)).await?;
        }
    }

    let style = job.payload.get("style").cloned().unwrap_or(Value::Null);
    let force_style = compose_force_style(&style);
    let mut subs_arg = escape_filter_path(&ass_path);
    if let Some(force_style) = &force_style {
        subs_arg = format!("{subs_arg}:force_style='{force_style}'");
    }

    ensure_not_cancelled(state, job.id).await?;
    super::progress::report(state, job.id, 0.5, None, Some("burning subtitles")).await;

    let out_path = tmp.path().join("styled.mp4");
    let mut invocation = burn_subtitles_args(&video_path, &subs_arg, &out_path, &[]);
    if let Some(preview_seconds) = job.payload.get("preview_seconds").and_then(Value::as_f64) {
        let out_index = invocation.args.len() - 1;
        invocation.args.splice(out_index..out_index, ["-t".to_string(), preview_seconds.to_string()]);
    }
    invocation = Invocation::new(invocation.binary, splice_codec_args(invocation.args));

    default_runner().run(&invocation).await.map_err(|e| anyhow::anyhow!("failed to burn subtitles: {e}"))?;

    ensure_not_cancelled(state, job.id).await?;
    let output_asset = store_derived_asset(state, "video", &out_path, super::job_type_mime("video"), None).await?;

    let payload_patch = json!({"subtitle_asset_id": subtitle_asset_id});
    job_store::finish_job(&state.pool, job.id, JobStatus::Completed, 1.0, Some(payload_patch), None, Some(output_asset.id)).await?;
    Ok(())
}

/// Pin the video/audio codecs so a subtitle burn always re-encodes video
/// (required since the `subtitles` filter touches every frame) while
/// carrying audio through untouched.
fn splice_codec_args(mut args: Vec<String>) -> Vec<String> {
    let out = args.pop().expect("burn_subtitles_args always appends the output path");
    args.extend(["-c:v".to_string(), "libx264".to_string(), "-pix_fmt".to_string(), "yuv420p".to_string(), "-c:a".to_string(), "copy".to_string()]);
    args.push(out);
    args
}
