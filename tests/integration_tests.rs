//! Integration tests for reframe
//!
//! These validate cross-module flows — store + broker + domain working
//! together — rather than re-checking behavior already covered by each
//! module's own unit tests.

use reframe::broker::{Broker, InMemoryBroker};
use reframe::domain::serialize::{parse_srt, parse_vtt, to_ass_karaoke, to_srt, to_vtt};
use reframe::domain::translate::{translate_srt, translate_srt_bilingual};
use reframe::domain::{equal_splits, group_words, select_top, GroupingConfig, NoOpTranslator, SegmentCandidate, Word};
use reframe::store::assets::{create_asset, NewMediaAsset};
use reframe::store::jobs::{attach_task_id, create_job, finish_job, get_job, NewJob};
use reframe::store::models::{JobStatus, JobType};
use serde_json::json;
use sqlx::SqlitePool;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

// ============================================================================
// Job dispatch integration tests
// ============================================================================

mod job_dispatch_tests {
    use super::*;

    /// A job row created, dispatched through the in-memory broker, received
    /// on the other end, and carried through to a terminal commit — the same
    /// path `api::jobs::create_and_dispatch` plus `worker::run_pipeline`
    /// exercise in production, minus the ffmpeg work in between.
    #[tokio::test]
    async fn job_round_trips_through_broker_to_a_terminal_state() {
        let pool = test_pool().await;
        let (broker, _progress_rx) = InMemoryBroker::new();

        let asset = create_asset(&pool, NewMediaAsset { kind: "video".into(), uri: Some("uploads/video/in.mp4".into()), mime_type: Some("video/mp4".into()), duration: Some(12.0) })
            .await
            .unwrap();

        let job = create_job(&pool, NewJob { job_type: JobType::CutClip, payload: json!({"start": 0.0, "end": 5.0}), input_asset_id: Some(asset.id) }).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let task_id = broker.publish_job("tasks.cut_clip", job.id, job.payload.clone()).await.unwrap();
        let job = attach_task_id(&pool, job.id, &task_id).await.unwrap();
        assert_eq!(job.task_id.as_deref(), Some(task_id.as_str()));

        let dispatched = broker.recv_job().await.unwrap();
        assert_eq!(dispatched.job_id, job.id);
        assert_eq!(dispatched.task_name, "tasks.cut_clip");

        let output = create_asset(&pool, NewMediaAsset { kind: "video".into(), uri: Some("tmp/out.mp4".into()), mime_type: Some("video/mp4".into()), duration: Some(5.0) }).await.unwrap();
        let finished = finish_job(&pool, job.id, JobStatus::Completed, 1.0, None, None, Some(output.id)).await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.output_asset_id, Some(output.id));

        let reloaded = get_job(&pool, job.id).await.unwrap();
        assert_eq!(reloaded.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_job_id_fails_lookup_rather_than_panicking() {
        let pool = test_pool().await;
        let err = get_job(&pool, uuid::Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code, reframe::error::ErrorCode::NotFound);
    }
}

// ============================================================================
// Caption pipeline shape integration tests (transcript -> lines -> files)
// ============================================================================

mod caption_shape_tests {
    use super::*;

    fn sample_words() -> Vec<Word> {
        vec![
            Word::new("hello", 0.0, 0.4).unwrap(),
            Word::new("world", 0.45, 0.9).unwrap(),
            Word::new("this", 3.0, 3.3).unwrap(),
            Word::new("is", 3.35, 3.5).unwrap(),
            Word::new("reframe", 3.55, 4.0).unwrap(),
        ]
    }

    /// A transcript grouped into lines, serialized to SRT, and read back
    /// unchanged in cue count and text — the same shape `worker::captions`
    /// writes and a later `worker::style_subtitles` run reads back.
    #[test]
    fn grouped_lines_survive_an_srt_round_trip() {
        let lines = group_words(&sample_words(), &GroupingConfig::default());
        assert!(!lines.is_empty());

        let srt = to_srt(&lines);
        let reparsed = parse_srt(&srt).unwrap();
        assert_eq!(reparsed.len(), lines.len());
        for (original, reparsed) in lines.iter().zip(reparsed.iter()) {
            assert_eq!(original.text(), reparsed.text());
        }
    }

    #[test]
    fn vtt_round_trip_preserves_cue_text() {
        let lines = group_words(&sample_words(), &GroupingConfig::default());
        let vtt = to_vtt(&lines);
        assert!(vtt.starts_with("WEBVTT"));
        let reparsed = parse_vtt(&vtt).unwrap();
        assert_eq!(reparsed.len(), lines.len());
    }

    /// `worker::style_subtitles` converts any subtitle format to karaoke ASS
    /// before handing it to ffmpeg's `subtitles` filter.
    #[test]
    fn ass_karaoke_output_contains_one_dialogue_line_per_cue() {
        let lines = group_words(&sample_words(), &GroupingConfig::default());
        let ass = to_ass_karaoke(&lines);
        assert!(ass.contains("[Script Info]"));
        assert_eq!(ass.matches("Dialogue:").count(), lines.len());
    }
}

// ============================================================================
// Translation integration tests
// ============================================================================

mod translation_tests {
    use super::*;

    #[tokio::test]
    async fn noop_translator_round_trip_preserves_cue_count_and_timing() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\nhello\n\n2\n00:00:01,500 --> 00:00:02,500\nworld\n";
        let out = translate_srt(srt, &NoOpTranslator, "en", "es").await.unwrap();
        let lines = parse_srt(&out).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "hello");
        assert_eq!(lines[1].text(), "world");
    }

    #[tokio::test]
    async fn bilingual_noop_translation_keeps_original_text_on_both_sides() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\nhola\n";
        let out = translate_srt_bilingual(srt, &NoOpTranslator, "es", "en", "\\N").await.unwrap();
        assert!(out.contains("hola\\Nhola"));
    }
}

// ============================================================================
// Shorts candidate selection integration tests
// ============================================================================

mod shorts_selection_tests {
    use super::*;

    #[test]
    fn equal_splits_cover_the_whole_duration_without_gaps() {
        let candidates = equal_splits(130.0, 45.0);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].start, 0.0);
        assert_eq!(candidates.last().unwrap().end, 130.0);
        for pair in candidates.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn select_top_respects_max_clips_and_never_overlaps() {
        let candidates: Vec<SegmentCandidate> = (0..6)
            .map(|i| {
                let mut c = SegmentCandidate::new(i as f64 * 20.0, i as f64 * 20.0 + 20.0);
                c.score = 6.0 - i as f64;
                c
            })
            .collect();

        let selected = select_top(&candidates, 2, 15.0, 25.0, 1.0);
        assert!(selected.len() <= 2);
        for pair in selected.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn select_top_filters_out_of_bounds_durations() {
        let candidates = vec![SegmentCandidate::new(0.0, 5.0), SegmentCandidate::new(10.0, 80.0)];
        let selected = select_top(&candidates, 5, 15.0, 60.0, 1.0);
        assert!(selected.is_empty());
    }
}

// ============================================================================
// End-to-end pipeline tests against real ffmpeg
//
// These drive the actual worker pipelines (not just their pure helpers)
// against media generated by a real `ffmpeg` binary. They skip themselves
// with a message on stderr rather than failing when `ffmpeg` isn't on
// `PATH`, the same way `audio::extract`'s own tests do — there is no
// `#[ignore]` involved, so a CI box with ffmpeg installed runs them by
// default.
// ============================================================================

mod ffmpeg_pipeline_tests {
    use super::*;
    use reframe::api::rate_limit::RateLimiter;
    use reframe::api::AppState;
    use reframe::config::Settings;
    use reframe::storage::LocalStorageBackend;
    use reframe::store::jobs::create_job;
    use reframe::store::models::JobType;
    use reframe::worker::{captions, cut_clip, shorts};
    use std::process::Stdio;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::process::Command;

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg").arg("-version").output().map(|o| o.status.success()).unwrap_or(false)
    }

    async fn test_state(media_root: std::path::PathBuf) -> AppState {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let (broker, _rx) = InMemoryBroker::new();
        let mut settings = Settings::from_env().unwrap();
        settings.media_root = media_root;
        settings.offline_mode = true;
        let settings = Arc::new(settings);
        AppState {
            pool,
            storage: Arc::new(LocalStorageBackend::new(settings.media_root.clone())),
            broker: Arc::new(broker),
            rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window_seconds)),
            settings,
        }
    }

    /// Runs an ffmpeg invocation to build a test fixture directly, bypassing
    /// the crate's own runner — this is test setup, not the thing under
    /// test.
    async fn run_ffmpeg(args: &[&str]) {
        let status = Command::new("ffmpeg").args(args).stdout(Stdio::null()).stderr(Stdio::null()).status().await.unwrap();
        assert!(status.success(), "fixture ffmpeg invocation failed: {args:?}");
    }

    async fn seed_video_asset(state: &AppState, path: &std::path::Path, duration: f64) -> reframe::store::models::MediaAsset {
        let uri = state.storage.write_file("uploads/video", "fixture.mp4", path, Some("video/mp4")).await.unwrap();
        create_asset(&state.pool, NewMediaAsset { kind: "video".into(), uri: Some(uri), mime_type: Some("video/mp4".into()), duration: Some(duration) }).await.unwrap()
    }

    /// An 8-second clip, silent for the first 4 seconds and a steady tone
    /// for the last 4, as a single equal-split candidate covering the whole
    /// duration. `trim_silence` should advance the clip's start out of the
    /// leading silence, landing within a second of the 4-second boundary.
    #[tokio::test]
    async fn shorts_trim_silence_advances_start_past_leading_silence() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }

        let media_dir = tempdir().unwrap();
        let fixture = media_dir.path().join("silence_then_tone.mp4");
        run_ffmpeg(&[
            "-y",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=1000:duration=8",
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=320x240:d=8",
            "-filter_complex",
            "[0:a]volume=enable='lt(t,4)':volume=0[a]",
            "-map",
            "1:v",
            "-map",
            "[a]",
            "-shortest",
            "-pix_fmt",
            "yuv420p",
            fixture.to_str().unwrap(),
        ])
        .await;

        let state = test_state(tempdir().unwrap().path().to_path_buf()).await;
        let asset = seed_video_asset(&state, &fixture, 8.0).await;
        let job = create_job(
            &state.pool,
            NewJob {
                job_type: JobType::Shorts,
                payload: json!({"max_clips": 1, "min_duration": 3.0, "max_duration": 8.0, "options": {"trim_silence": true}}),
                input_asset_id: Some(asset.id),
            },
        )
        .await
        .unwrap();

        shorts::run(&state, &job).await.unwrap();

        let finished = get_job(&state.pool, job.id).await.unwrap();
        let clips = finished.payload["clip_assets"].as_array().unwrap();
        assert_eq!(clips.len(), 1);
        let start = clips[0]["start"].as_f64().unwrap();
        assert!((3.5..=4.5).contains(&start), "expected start near the silence/tone boundary, got {start}");
    }

    /// A caption job run against the noop transcription backend (no network
    /// access, no external model) still carries a real video fixture
    /// through ffmpeg probing/extraction and produces a well-formed SRT
    /// asset. The noop backend always emits a single word spanning
    /// `[0.0, 1.0)`, so that's the cue timing asserted here rather than a
    /// duration-derived one a real speech model would produce.
    #[tokio::test]
    async fn captions_pipeline_produces_a_well_formed_srt_asset() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }

        let media_dir = tempdir().unwrap();
        let fixture = media_dir.path().join("tone.mp4");
        run_ffmpeg(&[
            "-y",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=1000:duration=2",
            "-f",
            "lavfi",
            "-i",
            "color=c=blue:s=320x240:d=2",
            "-shortest",
            "-pix_fmt",
            "yuv420p",
            fixture.to_str().unwrap(),
        ])
        .await;

        let state = test_state(tempdir().unwrap().path().to_path_buf()).await;
        let asset = seed_video_asset(&state, &fixture, 2.0).await;
        let job = create_job(
            &state.pool,
            NewJob { job_type: JobType::Captions, payload: json!({"backend": "noop", "format": "srt"}), input_asset_id: Some(asset.id) },
        )
        .await
        .unwrap();

        captions::run(&state, &job).await.unwrap();

        let finished = get_job(&state.pool, job.id).await.unwrap();
        let output_id = finished.output_asset_id.unwrap();
        let output_asset = reframe::store::assets::get_asset(&state.pool, output_id).await.unwrap();
        let output_path = state.storage.resolve_local_path(output_asset.uri.as_deref().unwrap()).unwrap();
        let body = tokio::fs::read_to_string(&output_path).await.unwrap();
        assert!(body.contains("00:00:00,000 --> 00:00:01,000"), "unexpected SRT body:\n{body}");
    }

    /// A 4-second fixture cut from 0.5s to 1.5s produces a nonempty output
    /// video asset at a real path on disk.
    #[tokio::test]
    async fn cut_clip_pipeline_produces_a_nonempty_video_asset() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }

        let media_dir = tempdir().unwrap();
        let fixture = media_dir.path().join("four_seconds.mp4");
        run_ffmpeg(&[
            "-y",
            "-f",
            "lavfi",
            "-i",
            "color=c=red:s=320x240:d=4",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:duration=4",
            "-shortest",
            "-pix_fmt",
            "yuv420p",
            fixture.to_str().unwrap(),
        ])
        .await;

        let state = test_state(tempdir().unwrap().path().to_path_buf()).await;
        let asset = seed_video_asset(&state, &fixture, 4.0).await;
        let job = create_job(&state.pool, NewJob { job_type: JobType::CutClip, payload: json!({"start": 0.5, "end": 1.5}), input_asset_id: Some(asset.id) }).await.unwrap();

        cut_clip::run(&state, &job).await.unwrap();

        let finished = get_job(&state.pool, job.id).await.unwrap();
        let output_id = finished.output_asset_id.unwrap();
        let output_asset = reframe::store::assets::get_asset(&state.pool, output_id).await.unwrap();
        let output_path = state.storage.resolve_local_path(output_asset.uri.as_deref().unwrap()).unwrap();
        let metadata = tokio::fs::metadata(&output_path).await.unwrap();
        assert!(metadata.len() > 0);
    }
}
