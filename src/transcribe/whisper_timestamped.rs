use super::normalize::normalize_whisper_timestamped;
use super::{Transcriber, TranscriptionConfig};
use crate::domain::TranscriptionResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;

/// Runs whisper-timestamped (or a whisperX-compatible sidecar) via CLI,
/// reading its `{text, segments: [...]}` JSON report from stdout.
/// Offline-safe.
pub struct WhisperTimestampedTranscriber {
    binary: String,
}

impl WhisperTimestampedTranscriber {
    pub fn new() -> Self {
        Self { binary: "whisper-timestamped-cli".to_string() }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for WhisperTimestampedTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for WhisperTimestampedTranscriber {
    async fn transcribe(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<TranscriptionResult> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model").arg(&config.model).arg("--input").arg(media_path);
        if let Some(lang) = &config.language {
            cmd.arg("--language").arg(lang);
        }

        let output = cmd.output().await.with_context(|| format!("spawning {}", self.binary))?;
        if !output.status.success() {
            bail!("{} exited with {}: {}", self.binary, output.status, String::from_utf8_lossy(&output.stderr));
        }

        let payload: Value = serde_json::from_slice(&output.stdout).context("parsing whisper-timestamped JSON output")?;
        Ok(normalize_whisper_timestamped(&payload, Some(config.model.clone()), config.language.clone()))
    }
}
