use super::runner::{Invocation, ProcessRunner};
use crate::error::{FfmpegError, FfmpegResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProbe {
    pub path: String,
    pub duration: f64,
    pub bitrate: Option<u64>,
    pub video: Option<VideoStreamInfo>,
    pub audio_codecs: Vec<String>,
}

fn parse_probe_json(path: &Path, raw: &[u8]) -> FfmpegResult<MediaProbe> {
    let parsed: Value = serde_json::from_slice(raw).map_err(|e| FfmpegError::Parse(e.to_string()))?;

    let duration = parsed
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let bitrate = parsed
        .get("format")
        .and_then(|f| f.get("bit_rate"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok());

    let streams = parsed.get("streams").and_then(Value::as_array).cloned().unwrap_or_default();

    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(Value::as_str) == Some("video"))
        .map(|s| VideoStreamInfo {
            codec: s.get("codec_name").and_then(Value::as_str).unwrap_or_default().to_string(),
            width: s.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
            height: s.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
        });

    let audio_codecs: Vec<String> = streams
        .iter()
        .filter(|s| s.get("codec_type").and_then(Value::as_str) == Some("audio"))
        .filter_map(|s| s.get("codec_name").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    Ok(MediaProbe { path: path.display().to_string(), duration, bitrate, video, audio_codecs })
}

/// Probe a media file's format and stream metadata via `ffprobe -print_format json`.
pub async fn probe_media(path: &Path, runner: &dyn ProcessRunner) -> FfmpegResult<MediaProbe> {
    if !path.is_file() {
        return Err(FfmpegError::InputNotFound(path.display().to_string()));
    }

    let invocation = Invocation::new(
        "ffprobe",
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.display().to_string(),
        ],
    );
    let output = runner.run(&invocation).await?;
    parse_probe_json(path, &output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_bitrate_video_and_audio_codecs() {
        let raw = br#"{
            "format": {"duration": "1.5", "bit_rate": "64000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let probe = parse_probe_json(Path::new("sample.mp4"), raw).unwrap();
        assert_eq!(probe.duration, 1.5);
        assert_eq!(probe.bitrate, Some(64000));
        assert_eq!(probe.video.unwrap().width, 1920);
        assert_eq!(probe.audio_codecs, vec!["aac".to_string()]);
    }

    #[test]
    fn tolerates_missing_video_stream() {
        let raw = br#"{"format": {"duration": "2.0"}, "streams": [{"codec_type": "audio", "codec_name": "mp3"}]}"#;
        let probe = parse_probe_json(Path::new("a.mp3"), raw).unwrap();
        assert!(probe.video.is_none());
        assert_eq!(probe.audio_codecs, vec!["mp3".to_string()]);
    }
}
