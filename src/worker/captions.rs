use super::{ensure_not_cancelled, fetch_input, primary_asset, retry, store_derived_asset, PipelineResult};
use crate::api::AppState;
use crate::domain::diarize::{cluster_speechbrain_regions, EmbeddedRegion};
use crate::domain::serialize::{to_srt, to_vtt};
use crate::domain::{assign_speakers_to_lines, group_words, DiarizationBackend, GroupingConfig};
use crate::ffmpeg::{default_runner, extract_audio_16k_mono, run_with_retry, FfmpegError, RetryPolicy};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus};
use crate::transcribe::normalize::normalize_model_name;
use crate::transcribe::{build_transcriber, TranscriptionBackend, TranscriptionConfig};
use anyhow::Context;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::tempdir;
use tokio::process::Command;

/// `tasks.generate_captions`: transcribe the job's input video/audio,
/// greedily group the resulting words into subtitle lines, optionally
/// diarize and label speakers, and persist the serialized result as a new
/// subtitle asset.
///
/// Transcription failures exhaust their retry budget against the
/// configured backend, then fall back once to the noop backend rather than
/// failing the job outright — a caption job that produces a synthetic
/// single-cue transcript is still a completed job, with the failure
/// recorded as a warning.
pub async fn run(state: &AppState, job: &Job) -> PipelineResult<()> {
    ensure_not_cancelled(state, job.id).await?;
    let asset = primary_asset(state, job).await?;

    let tmp = tempdir()?;
    let media_path = fetch_input(state, &asset, tmp.path()).await?;

    super::progress::report(state, job.id, 0.2, None, Some("transcribing")).await;

    let backend: TranscriptionBackend = job
        .payload
        .get("backend")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_value(json!(s)).ok())
        .unwrap_or_default();
    let format = job.payload.get("format").and_then(Value::as_str).unwrap_or("srt").to_string();

    let mut config = TranscriptionConfig { backend, offline_mode: state.settings.offline_mode, ..Default::default() };
    if let Some(lang) = job.payload.get("language").and_then(Value::as_str) {
        config.language = Some(lang.to_string());
    }
    if let Some(model) = job.payload.get("model").and_then(Value::as_str) {
        config.model = normalize_model_name(model);
    }

    let mut warnings: Vec<String> = Vec::new();

    let transcriber = build_transcriber(backend, std::env::var("OPENAI_API_KEY").ok());
    let policy = RetryPolicy { max_attempts: state.settings.job_retry_max_attempts as usize, base_delay_seconds: state.settings.job_retry_base_delay_seconds as u64 };
    let on_retry = retry::on_retry_patch(state.pool.clone(), job.id);

    let transcription = match run_with_retry(
        "transcribe",
        policy,
        || async { transcriber.transcribe(&media_path, &config).await.map_err(|e| FfmpegError::Parse(e.to_string())) },
        on_retry,
    )
    .await
    {
        Ok(result) => result,
        Err(e) => {
            warnings.push(format!("{backend:?} transcription failed after retries ({e}); falling back to the noop backend"));
            let noop = build_transcriber(TranscriptionBackend::Noop, None);
            noop.transcribe(&media_path, &config).await.map_err(|e| anyhow::anyhow!("noop transcription fallback failed: {e}"))?
        }
    };

    ensure_not_cancelled(state, job.id).await?;
    super::progress::report(state, job.id, 0.6, None, Some("grouping lines")).await;

    let mut lines = group_words(&transcription.words, &GroupingConfig::default());
    let cue_count = lines.len();

    if job.payload.get("speaker_labels").and_then(Value::as_bool).unwrap_or(false) {
        let diarization_backend: DiarizationBackend = job
            .payload
            .get("diarization_backend")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_value(json!(s)).ok())
            .unwrap_or_default();

        match diarization_backend {
            DiarizationBackend::SpeechBrain => {
                let pcm_path = tmp.path().join("diarize_16k_mono.wav");
                match extract_audio_16k_mono(&media_path, &pcm_path, default_runner().as_ref()).await {
                    Ok(()) => match run_speechbrain_diarization(&pcm_path).await {
                        Ok(segments) => lines = assign_speakers_to_lines(&lines, &segments),
                        Err(e) => warnings.push(format!("speechbrain diarization failed ({e}); skipping speaker labels")),
                    },
                    Err(e) => warnings.push(format!("failed to extract 16kHz mono audio for diarization ({e}); skipping speaker labels")),
                }
            }
            DiarizationBackend::Pyannote => {
                warnings.push("speaker_labels requested with the pyannote backend, which has no model-inference path in this stack; skipping".to_string());
            }
            DiarizationBackend::Noop => {
                warnings.push("speaker_labels requested but no diarization backend is configured; skipping".to_string());
            }
        }
    }

    let (body, ext, mime) = match format.as_str() {
        "vtt" => (to_vtt(&lines), "vtt", "text/vtt"),
        _ => (to_srt(&lines), "srt", "application/x-subrip"),
    };
    let out_path = tmp.path().join(format!("captions.{ext}"));
    tokio::fs::write(&out_path, &body).await?;

    ensure_not_cancelled(state, job.id).await?;
    let output_asset = store_derived_asset(state, "subtitle", &out_path, mime, None).await?;

    let mut payload_patch = json!({"format": format, "cue_count": cue_count, "language": transcription.language});
    if !warnings.is_empty() {
        payload_patch["warnings"] = json!(warnings);
    }

    job_store::finish_job(&state.pool, job.id, JobStatus::Completed, 1.0, Some(payload_patch), None, Some(output_asset.id)).await?;
    Ok(())
}

/// Runs a `speechbrain-diarize-cli` sidecar over a 16 kHz mono WAV and
/// clusters its emitted speaker-embedding regions into speaker segments. The
/// sidecar owns VAD and embedding extraction; this function only shells out
/// and hands the raw regions to the in-crate clustering algorithm.
async fn run_speechbrain_diarization(pcm_path: &Path) -> anyhow::Result<Vec<crate::domain::SpeakerSegment>> {
    let output = Command::new("speechbrain-diarize-cli")
        .arg("--input")
        .arg(pcm_path)
        .arg("--output-format")
        .arg("json")
        .output()
        .await
        .context("spawning speechbrain-diarize-cli")?;
    if !output.status.success() {
        anyhow::bail!("speechbrain-diarize-cli exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr));
    }
    let regions: Vec<EmbeddedRegion> = serde_json::from_slice(&output.stdout).context("parsing speechbrain-diarize-cli JSON output")?;
    Ok(cluster_speechbrain_regions(&regions, 0.0))
}
