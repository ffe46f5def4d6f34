use super::normalize::normalize_verbose_json;
use super::{Transcriber, TranscriptionConfig};
use crate::domain::TranscriptionResult;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const WHISPER_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const MAX_FILE_SIZE_BYTES: u64 = 25 * 1024 * 1024;

/// Transcribes via the hosted OpenAI Whisper API. Refuses to run when
/// `config.offline_mode` is set, matching the source backend's
/// `REFRAME_OFFLINE_MODE` guard.
pub struct OpenaiWhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
}

impl OpenaiWhisperTranscriber {
    pub fn new(api_key: String) -> Self {
        Self { client: reqwest::Client::new(), api_key }
    }

    async fn build_form(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<Form> {
        let bytes = tokio::fs::read(media_path).await.with_context(|| format!("reading {}", media_path.display()))?;
        let file_name = media_path.file_name().and_then(|n| n.to_str()).unwrap_or("audio").to_string();
        let mime = match media_path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "application/octet-stream",
        };
        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let mut form = Form::new().part("file", part).text("model", config.model.clone()).text("response_format", "verbose_json").text(
            "timestamp_granularities[]",
            "word",
        );
        if let Some(lang) = &config.language {
            form = form.text("language", lang.clone());
        }
        form = form.text("temperature", config.temperature.to_string());
        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<Value> {
        let response = self.client.post(WHISPER_API_URL).bearer_auth(&self.api_key).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            bail!("Whisper API error ({status}): {}", &body[..body.len().min(500)]);
        }
        serde_json::from_str(&body).context("parsing Whisper API response")
    }
}

#[async_trait]
impl Transcriber for OpenaiWhisperTranscriber {
    async fn transcribe(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<TranscriptionResult> {
        if config.offline_mode {
            return Err(anyhow!("offline_mode is enabled; refusing to call the OpenAI transcription API"));
        }

        let metadata = tokio::fs::metadata(media_path).await.with_context(|| format!("stat {}", media_path.display()))?;
        if metadata.len() > MAX_FILE_SIZE_BYTES {
            bail!("file too large for Whisper API: {} bytes (max {MAX_FILE_SIZE_BYTES})", metadata.len());
        }

        let payload = (|| async {
            let form = self.build_form(media_path, config).await?;
            self.call_api(form).await
        })
        .retry(ExponentialBuilder::default().with_min_delay(Duration::from_secs(1)).with_max_times(3))
        .notify(|err: &anyhow::Error, dur: Duration| {
            warn!("Whisper API call failed, retrying in {dur:?}: {err}");
        })
        .await?;

        debug!("Whisper API returned {} bytes of JSON", payload.to_string().len());
        Ok(normalize_verbose_json(&payload, Some(config.model.clone()), config.language.clone()))
    }
}
