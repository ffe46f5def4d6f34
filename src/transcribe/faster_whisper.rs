use super::normalize::normalize_faster_whisper;
use super::{Transcriber, TranscriptionConfig};
use crate::domain::TranscriptionResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;

/// Runs local faster-whisper inference via a sidecar CLI (`faster-whisper-cli`
/// by default) that prints a JSON array of `{text, words: [...]}` segments to
/// stdout. Offline-safe: no network calls.
pub struct FasterWhisperTranscriber {
    binary: String,
}

impl FasterWhisperTranscriber {
    pub fn new() -> Self {
        Self { binary: "faster-whisper-cli".to_string() }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for FasterWhisperTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for FasterWhisperTranscriber {
    async fn transcribe(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<TranscriptionResult> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model").arg(&config.model).arg("--input").arg(media_path).arg("--output-format").arg("json");
        if let Some(lang) = &config.language {
            cmd.arg("--language").arg(lang);
        }
        if let Some(device) = &config.device {
            cmd.arg("--device").arg(device);
        }

        let output = cmd.output().await.with_context(|| format!("spawning {}", self.binary))?;
        if !output.status.success() {
            bail!("{} exited with {}: {}", self.binary, output.status, String::from_utf8_lossy(&output.stderr));
        }

        let segments: Vec<Value> = serde_json::from_slice(&output.stdout).context("parsing faster-whisper JSON output")?;
        Ok(normalize_faster_whisper(&segments, Some(config.model.clone()), config.language.clone()))
    }
}
