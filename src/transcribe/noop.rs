use super::{Transcriber, TranscriptionConfig};
use crate::domain::{TranscriptionResult, Word};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Synthesizes a single word spanning the whole file, named after the
/// input's filename. Used in tests and for offline smoke-testing the
/// pipeline without a real transcription backend installed.
pub struct NoopTranscriber;

#[async_trait]
impl Transcriber for NoopTranscriber {
    async fn transcribe(&self, media_path: &Path, config: &TranscriptionConfig) -> Result<TranscriptionResult> {
        let name = media_path.file_stem().and_then(|s| s.to_str()).unwrap_or("audio").to_string();
        let word = Word::new(name, 0.0, 1.0)?;
        Ok(TranscriptionResult::from_words(vec![word], None, Some("noop".to_string()), config.language.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_single_synthetic_word_named_after_file() {
        let transcriber = NoopTranscriber;
        let config = TranscriptionConfig::default();
        let result = transcriber.transcribe(Path::new("/tmp/my-clip.wav"), &config).await.unwrap();
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].text, "my-clip");
        assert_eq!(result.words[0].start, 0.0);
        assert_eq!(result.words[0].end, 1.0);
    }
}
