use super::probe::probe_media;
use super::runner::{Invocation, ProcessRunner};
use crate::error::{FfmpegError, FfmpegResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Build the argv for `ffmpeg -vn -acodec copy`, stripping video and
/// remuxing the audio stream without re-encoding.
pub fn extract_audio_args(video: &Path, audio: &Path) -> Invocation {
    Invocation::new(
        "ffmpeg",
        vec!["-y".into(), "-i".into(), path_arg(video), "-vn".into(), "-acodec".into(), "copy".into(), path_arg(audio)],
    )
}

pub async fn extract_audio(video: &Path, audio: &Path, runner: &dyn ProcessRunner) -> FfmpegResult<()> {
    runner.run(&extract_audio_args(video, audio)).await.map(|_| ())
}

/// Build the argv to extract a 16 kHz mono PCM WAV track, the input shape
/// speech models (diarization embeddings, local transcription sidecars)
/// expect.
pub fn extract_audio_16k_mono_args(input: &Path, wav: &Path) -> Invocation {
    Invocation::new(
        "ffmpeg",
        vec![
            "-y".into(),
            "-i".into(),
            path_arg(input),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            "16000".into(),
            "-ac".into(),
            "1".into(),
            path_arg(wav),
        ],
    )
}

pub async fn extract_audio_16k_mono(input: &Path, wav: &Path, runner: &dyn ProcessRunner) -> FfmpegResult<()> {
    runner.run(&extract_audio_16k_mono_args(input, wav)).await.map(|_| ())
}

/// Build the argv for a stream-copy cut: `-ss start -i video -t (end-start) -c copy`.
pub fn cut_clip_args(video: &Path, start: f64, end: f64, out: &Path) -> Invocation {
    let duration = (end - start).max(0.0);
    Invocation::new(
        "ffmpeg",
        vec![
            "-y".into(),
            "-ss".into(),
            start.to_string(),
            "-i".into(),
            path_arg(video),
            "-t".into(),
            duration.to_string(),
            "-c".into(),
            "copy".into(),
            path_arg(out),
        ],
    )
}

pub async fn cut_clip(video: &Path, start: f64, end: f64, out: &Path, runner: &dyn ProcessRunner) -> FfmpegResult<()> {
    runner.run(&cut_clip_args(video, start, end, out)).await.map(|_| ())
}

/// Reframing strategy for converting between aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReframeStrategy {
    /// Scale to fill, then crop the excess — loses picture at the edges.
    Crop,
    /// Scale to fit, then pad with black bars to the target ratio.
    Pad,
    /// Scale to fit over a blurred, cropped copy of the same frame as
    /// background — avoids both cropping loss and black bars.
    BlurBg,
}

fn aspect_ratio_expr(aspect_ratio: &str) -> String {
    aspect_ratio.replace(':', "/")
}

/// Build the argv for a reframe operation. `aspect_ratio` is `"W:H"`
/// (e.g. `"9:16"`).
pub fn reframe_args(video: &Path, out: &Path, aspect_ratio: &str, strategy: ReframeStrategy) -> Invocation {
    let ar = aspect_ratio_expr(aspect_ratio);
    match strategy {
        ReframeStrategy::Crop => {
            let filter = format!("scale=-1:ih,crop=iw:iw/{ar}");
            Invocation::new("ffmpeg", vec!["-y".into(), "-i".into(), path_arg(video), "-vf".into(), filter, path_arg(out)])
        }
        ReframeStrategy::Pad => {
            let filter = format!("scale=-1:ih,pad=ceil(iw*{ar}/2)*2:ceil(ih/{ar}/2)*2:(ow-iw)/2:(oh-ih)/2");
            Invocation::new("ffmpeg", vec!["-y".into(), "-i".into(), path_arg(video), "-vf".into(), filter, path_arg(out)])
        }
        ReframeStrategy::BlurBg => {
            let filter_complex = format!(
                "split=2[main][bgsrc];\
[bgsrc]scale=-1:ih,crop=iw:iw/{ar},gblur=sigma=20[bg];\
[main]scale=-1:ih*0.92[fg];\
[bg][fg]overlay=(W-w)/2:(H-h)/2[vout]"
            );
            Invocation::new(
                "ffmpeg",
                vec![
                    "-y".into(),
                    "-i".into(),
                    path_arg(video),
                    "-filter_complex".into(),
                    filter_complex,
                    "-map".into(),
                    "[vout]".into(),
                    "-map".into(),
                    "0:a?".into(),
                    path_arg(out),
                ],
            )
        }
    }
}

pub async fn reframe(video: &Path, out: &Path, aspect_ratio: &str, strategy: ReframeStrategy, runner: &dyn ProcessRunner) -> FfmpegResult<()> {
    runner.run(&reframe_args(video, out, aspect_ratio, strategy)).await.map(|_| ())
}

/// How hard to duck the background audio track when mixing it under the
/// primary one. `Default` matches the source's boolean `ducking=True`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ducking {
    Default,
    Level(f64),
}

impl Ducking {
    fn volume(self) -> f64 {
        match self {
            Ducking::Default => 0.25,
            Ducking::Level(v) => v,
        }
    }
}

/// Build the argv to merge an external audio track onto a video. When the
/// video itself carries no audio stream, the external track is mapped
/// directly instead of mixed.
pub fn merge_video_audio_args(
    video: &Path,
    audio: &Path,
    out: &Path,
    offset: f64,
    ducking: Option<Ducking>,
    normalize: bool,
    video_has_audio: bool,
) -> Invocation {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(video),
        "-itsoffset".to_string(),
        offset.to_string(),
        "-i".to_string(),
        path_arg(audio),
    ];

    if video_has_audio {
        let mut parts = Vec::new();
        let amix_inputs = match ducking {
            Some(d) => {
                parts.push(format!("[1:a]volume={}[ducked]", d.volume()));
                "[0:a][ducked]"
            }
            None => "[0:a][1:a]",
        };
        parts.push(format!("{amix_inputs}amix=inputs=2:duration=longest[mixed]"));
        let final_label = if normalize {
            parts.push("[mixed]loudnorm[aout]".to_string());
            "[aout]"
        } else {
            "[mixed]"
        };
        args.push("-filter_complex".to_string());
        args.push(parts.join(";"));
        args.push("-map".to_string());
        args.push("0:v".to_string());
        args.push("-map".to_string());
        args.push(final_label.to_string());
    } else {
        args.push("-map".to_string());
        args.push("0:v".to_string());
        args.push("-map".to_string());
        args.push("1:a".to_string());
        if normalize {
            args.push("-af".to_string());
            args.push("loudnorm".to_string());
        }
    }

    args.push("-c:v".to_string());
    args.push("copy".to_string());
    args.push("-c:a".to_string());
    args.push("aac".to_string());
    args.push("-shortest".to_string());
    args.push(path_arg(out));
    Invocation::new("ffmpeg", args)
}

#[allow(clippy::too_many_arguments)]
pub async fn merge_video_audio(
    video: &Path,
    audio: &Path,
    out: &Path,
    offset: f64,
    ducking: Option<Ducking>,
    normalize: bool,
    video_has_audio: bool,
    runner: &dyn ProcessRunner,
) -> FfmpegResult<()> {
    runner.run(&merge_video_audio_args(video, audio, out, offset, ducking, normalize, video_has_audio)).await.map(|_| ())
}

/// Build the argv to burn subtitles into a video. `subs` is the filter's
/// `subtitles=<path>` argument verbatim — callers that need
/// `force_style=...` build that string themselves before calling this.
pub fn burn_subtitles_args(video: &Path, subs: &str, out: &Path, extra_filters: &[String]) -> Invocation {
    let mut filters = vec![format!("subtitles={subs}")];
    filters.extend(extra_filters.iter().cloned());
    let filter_chain = filters.join(",");
    Invocation::new("ffmpeg", vec!["-y".into(), "-i".into(), path_arg(video), "-vf".into(), filter_chain, path_arg(out)])
}

pub async fn burn_subtitles(video: &Path, subs: &str, out: &Path, extra_filters: &[String], runner: &dyn ProcessRunner) -> FfmpegResult<()> {
    runner.run(&burn_subtitles_args(video, subs, out, extra_filters)).await.map(|_| ())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

fn silence_regex() -> (&'static Regex, &'static Regex) {
    static START: OnceLock<Regex> = OnceLock::new();
    static END: OnceLock<Regex> = OnceLock::new();
    (
        START.get_or_init(|| Regex::new(r"silence_start:\s*(-?[0-9.]+)").unwrap()),
        END.get_or_init(|| Regex::new(r"silence_end:\s*(-?[0-9.]+)").unwrap()),
    )
}

/// Parse `silencedetect` stderr lines into closed intervals. A trailing
/// `silence_start` with no matching `silence_end` is closed at
/// `total_duration` — the stream ended while still silent.
pub fn parse_silence_stderr(stderr: &str, total_duration: f64) -> Vec<SilenceInterval> {
    let (start_re, end_re) = silence_regex();
    let mut intervals = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = start_re.captures(line) {
            if let Ok(start) = caps[1].parse::<f64>() {
                open_start = Some(start);
            }
        } else if let Some(caps) = end_re.captures(line) {
            if let (Some(start), Ok(end)) = (open_start.take(), caps[1].parse::<f64>()) {
                intervals.push(SilenceInterval { start, end });
            }
        }
    }

    if let Some(start) = open_start {
        intervals.push(SilenceInterval { start, end: total_duration });
    }
    intervals
}

/// Run `silencedetect` over a media file and return its silent intervals.
pub async fn detect_silence(media: &Path, noise_threshold_db: f64, min_duration: f64, runner: &dyn ProcessRunner) -> FfmpegResult<Vec<SilenceInterval>> {
    if !media.is_file() {
        return Err(FfmpegError::InputNotFound(media.display().to_string()));
    }

    let probe = probe_media(media, runner).await?;

    let invocation = Invocation::new(
        "ffmpeg",
        vec![
            "-i".to_string(),
            path_arg(media),
            "-af".to_string(),
            format!("silencedetect=noise={noise_threshold_db}dB:d={min_duration}"),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ],
    );
    let output = runner.run(&invocation).await?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_silence_stderr(&stderr, probe.duration))
}

#[cfg(test)]
mod tests {
    use super::super::runner::test_support::FakeRunner;
    use super::*;

    #[test]
    fn extract_audio_args_strips_video() {
        let inv = extract_audio_args(Path::new("v.mp4"), Path::new("a.aac"));
        assert!(inv.args.contains(&"-vn".to_string()));
        assert!(inv.args.contains(&"copy".to_string()));
    }

    #[test]
    fn extract_audio_16k_mono_args_resamples_and_downmixes() {
        let inv = extract_audio_16k_mono_args(Path::new("v.mp4"), Path::new("a.wav"));
        assert!(inv.args.contains(&"pcm_s16le".to_string()));
        assert!(inv.args.windows(2).any(|w| w == ["-ar".to_string(), "16000".to_string()]));
        assert!(inv.args.windows(2).any(|w| w == ["-ac".to_string(), "1".to_string()]));
    }

    #[test]
    fn cut_clip_args_uses_start_and_duration() {
        let inv = cut_clip_args(Path::new("v.mp4"), 1.0, 3.5, Path::new("o.mp4"));
        assert!(inv.args.contains(&"-ss".to_string()));
        assert!(inv.args.contains(&"2.5".to_string()));
    }

    #[test]
    fn reframe_crop_emits_vf_chain() {
        let inv = reframe_args(Path::new("v.mp4"), Path::new("o.mp4"), "9:16", ReframeStrategy::Crop);
        assert!(inv.args.contains(&"-vf".to_string()));
        assert!(inv.args.iter().any(|a| a.contains("crop=iw:iw/9/16")));
    }

    #[test]
    fn reframe_blur_bg_uses_filter_complex() {
        let inv = reframe_args(Path::new("v.mp4"), Path::new("o.mp4"), "9:16", ReframeStrategy::BlurBg);
        assert!(inv.args.contains(&"-filter_complex".to_string()));
        assert!(inv.args.iter().any(|a| a.contains("gblur")));
    }

    #[test]
    fn merge_video_audio_mixes_when_video_has_audio() {
        let inv = merge_video_audio_args(Path::new("v.mp4"), Path::new("a.aac"), Path::new("o.mp4"), 0.5, Some(Ducking::Default), true, true);
        assert!(inv.args.iter().any(|a| a.contains("amix")));
        assert!(inv.args.iter().any(|a| a.contains("volume=0.25")));
        assert!(inv.args.iter().any(|a| a.contains("loudnorm")));
    }

    #[test]
    fn merge_video_audio_maps_directly_when_video_has_no_audio() {
        let inv = merge_video_audio_args(Path::new("v.mp4"), Path::new("a.aac"), Path::new("o.mp4"), 0.0, None, false, false);
        assert!(!inv.args.iter().any(|a| a.contains("amix")));
        assert!(inv.args.windows(2).any(|w| w == ["-map".to_string(), "1:a".to_string()]));
    }

    #[test]
    fn burn_subtitles_prepends_subtitles_filter() {
        let inv = burn_subtitles_args(Path::new("v.mp4"), "subs.srt", Path::new("o.mp4"), &[]);
        assert!(inv.args.iter().any(|a| a == "subtitles=subs.srt"));
    }

    #[test]
    fn burn_subtitles_appends_extra_filters() {
        let inv = burn_subtitles_args(Path::new("v.mp4"), "subs.srt", Path::new("o.mp4"), &["eq=brightness=0.1".to_string()]);
        assert!(inv.args.iter().any(|a| a == "subtitles=subs.srt,eq=brightness=0.1"));
    }

    #[test]
    fn parse_silence_stderr_closes_trailing_open_interval() {
        let stderr = "[silencedetect @ 0x0] silence_start: 1.5\n[silencedetect @ 0x0] silence_end: 2.5 | silence_duration: 1.0\n[silencedetect @ 0x0] silence_start: 9.0\n";
        let intervals = parse_silence_stderr(stderr, 10.0);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0], SilenceInterval { start: 1.5, end: 2.5 });
        assert_eq!(intervals[1], SilenceInterval { start: 9.0, end: 10.0 });
    }

    #[tokio::test]
    async fn extract_audio_invokes_runner_once() {
        let runner = FakeRunner::new(Vec::new());
        extract_audio(Path::new("v.mp4"), Path::new("a.aac"), &runner).await.unwrap();
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }
}
