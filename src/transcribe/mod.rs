mod faster_whisper;
mod noop;
pub mod normalize;
mod openai_whisper;
mod whisper_cpp;
mod whisper_timestamped;

pub use faster_whisper::FasterWhisperTranscriber;
pub use noop::NoopTranscriber;
pub use openai_whisper::OpenaiWhisperTranscriber;
pub use whisper_cpp::WhisperCppTranscriber;
pub use whisper_timestamped::WhisperTimestampedTranscriber;

use crate::domain::TranscriptionResult;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Which transcription backend a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionBackend {
    #[default]
    OpenaiWhisper,
    FasterWhisper,
    WhisperCpp,
    WhisperTimestamped,
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackend,
    pub model: String,
    pub language: Option<String>,
    pub device: Option<String>,
    pub temperature: f32,
    /// When true, backends that call a remote API refuse to run. Threaded
    /// in explicitly rather than read from the environment, so callers
    /// control it the same way they control everything else about the job.
    #[serde(default)]
    pub offline_mode: bool,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: TranscriptionBackend::default(),
            model: "whisper-1".to_string(),
            language: None,
            device: None,
            temperature: 0.0,
            offline_mode: false,
        }
    }
}

/// A transcription backend: audio/video file in, normalized
/// [`TranscriptionResult`] out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<TranscriptionResult>;
}

/// Build the configured backend. Each backend only needs the pieces of
/// config relevant to it; unused fields (e.g. `device` for the OpenAI
/// backend) are ignored.
pub fn build_transcriber(backend: TranscriptionBackend, api_key: Option<String>) -> Arc<dyn Transcriber> {
    match backend {
        TranscriptionBackend::OpenaiWhisper => Arc::new(OpenaiWhisperTranscriber::new(api_key.unwrap_or_default())),
        TranscriptionBackend::FasterWhisper => Arc::new(FasterWhisperTranscriber::new()),
        TranscriptionBackend::WhisperCpp => Arc::new(WhisperCppTranscriber::new()),
        TranscriptionBackend::WhisperTimestamped => Arc::new(WhisperTimestampedTranscriber::new()),
        TranscriptionBackend::Noop => Arc::new(NoopTranscriber),
    }
}
