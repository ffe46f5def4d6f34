use crate::error::ApiError;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCaptionsJob {
    pub video_asset_id: Uuid,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct TranslateSubtitlesJob {
    pub subtitle_asset_id: Uuid,
    pub target_language: String,
    #[serde(default)]
    pub bilingual: bool,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct StyleSubtitlesJob {
    pub video_asset_id: Uuid,
    pub subtitle_asset_id: Uuid,
    #[serde(default)]
    pub style: Value,
    pub preview_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ShortsJob {
    pub video_asset_id: Uuid,
    pub max_clips: u32,
    pub min_duration: f64,
    pub max_duration: f64,
    pub aspect_ratio: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct MergeAvJob {
    pub video_asset_id: Uuid,
    pub audio_asset_id: Uuid,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub ducking: Option<Value>,
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct CutClipJob {
    pub video_asset_id: Uuid,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub options: Value,
}

impl CutClipJob {
    /// Normalizes `start >= 0`, `end >= start` per spec, returning a
    /// validation error rather than silently clamping.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.start < 0.0 {
            return Err(ApiError::validation("start must be >= 0"));
        }
        if self.end < self.start {
            return Err(ApiError::validation("end must be >= start"));
        }
        Ok(())
    }
}

impl ShortsJob {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.max_clips == 0 {
            return Err(ApiError::validation("max_clips must be >= 1"));
        }
        if self.min_duration <= 0.0 || self.max_duration < self.min_duration {
            return Err(ApiError::validation("min_duration must be > 0 and <= max_duration"));
        }
        Ok(())
    }
}

pub const ASSET_KINDS: [&str; 3] = ["video", "audio", "subtitle"];

pub fn validate_asset_kind(kind: &str) -> Result<(), ApiError> {
    if ASSET_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(ApiError::validation(format!("kind must be one of {ASSET_KINDS:?}")))
    }
}

pub fn validate_content_type(kind: &str, content_type: &str) -> Result<(), ApiError> {
    let ok = match kind {
        "video" => content_type.starts_with("video/"),
        "audio" => content_type.starts_with("audio/"),
        "subtitle" => content_type.starts_with("text/"),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ApiError::validation(format!("content-type '{content_type}' does not match asset kind '{kind}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_clip_rejects_negative_start() {
        let job = CutClipJob { video_asset_id: Uuid::nil(), start: -1.0, end: 2.0, options: Value::Null };
        assert!(job.validate().is_err());
    }

    #[test]
    fn cut_clip_rejects_end_before_start() {
        let job = CutClipJob { video_asset_id: Uuid::nil(), start: 2.0, end: 1.0, options: Value::Null };
        assert!(job.validate().is_err());
    }

    #[test]
    fn validate_content_type_matches_kind() {
        assert!(validate_content_type("video", "video/mp4").is_ok());
        assert!(validate_content_type("subtitle", "text/plain").is_ok());
        assert!(validate_content_type("video", "audio/mp3").is_err());
    }
}
