use super::normalize::normalize_whisper_cpp;
use super::{Transcriber, TranscriptionConfig};
use crate::domain::TranscriptionResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;

/// Runs whisper.cpp via its `main`/`whisper-cli` binary with `--output-json`,
/// reading the sibling `<input>.json` file it writes. Offline-safe.
pub struct WhisperCppTranscriber {
    binary: String,
}

impl WhisperCppTranscriber {
    pub fn new() -> Self {
        Self { binary: "whisper-cli".to_string() }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for WhisperCppTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    async fn transcribe(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<TranscriptionResult> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m").arg(&config.model).arg("-f").arg(media_path).arg("--output-json").arg("-of").arg(media_path);
        if let Some(lang) = &config.language {
            cmd.arg("-l").arg(lang);
        }

        let output = cmd.output().await.with_context(|| format!("spawning {}", self.binary))?;
        if !output.status.success() {
            bail!("{} exited with {}: {}", self.binary, output.status, String::from_utf8_lossy(&output.stderr));
        }

        let json_path = media_path.with_extension("json");
        let raw = tokio::fs::read(&json_path).await.with_context(|| format!("reading {}", json_path.display()))?;
        let parsed: Value = serde_json::from_slice(&raw).context("parsing whisper.cpp JSON output")?;
        let segments: Vec<Value> = parsed.get("transcription").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(normalize_whisper_cpp(&segments, Some(config.model.clone()), config.language.clone()))
    }
}
