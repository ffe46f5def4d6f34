use crate::domain::serialize::{parse_srt, to_srt};
use crate::domain::subtitle::SubtitleLine;
use crate::domain::word::Word;
use crate::error::CoreResult;
use async_trait::async_trait;
use serde_json::json;

/// A batch text translator. Implementations may call out to a local model,
/// a cloud API, or simply echo the input back.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_batch(&self, texts: &[String], src: &str, tgt: &str) -> Vec<String>;
}

/// Identity translator: returns every input unchanged. This is the
/// always-available offline fallback.
pub struct NoOpTranslator;

#[async_trait]
impl Translator for NoOpTranslator {
    async fn translate_batch(&self, texts: &[String], _src: &str, _tgt: &str) -> Vec<String> {
        texts.to_vec()
    }
}

/// A `chat.completions.create`-shaped chat client, used by [`CloudTranslator`].
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn create(&self, model: &str, system_prompt: &str, user_content: &str, temperature: f32) -> anyhow::Result<String>;
}

/// Translates by sending the whole batch as one JSON array to a chat model
/// and parsing the reply as a JSON array of translated strings, in order.
///
/// Falls back to returning the input unchanged if the client call fails or
/// the response cannot be parsed into exactly as many strings as were sent
/// — translation is best-effort, never a pipeline failure.
pub struct CloudTranslator {
    client: Box<dyn ChatClient>,
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl CloudTranslator {
    pub fn new(client: Box<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: "Translate {src} to {tgt}. Respond with a JSON array of translated strings in the same order, no commentary.".to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Translator for CloudTranslator {
    async fn translate_batch(&self, texts: &[String], src: &str, tgt: &str) -> Vec<String> {
        let prompt = self.system_prompt.replace("{src}", src).replace("{tgt}", tgt);
        let user_content = json!(texts).to_string();

        let response = match self.client.create(&self.model, &prompt, &user_content, self.temperature).await {
            Ok(text) => text,
            Err(_) => return texts.to_vec(),
        };

        match serde_json::from_str::<Vec<String>>(&response) {
            Ok(translated) if translated.len() == texts.len() => translated,
            _ => texts.to_vec(),
        }
    }
}

fn lines_to_srt(lines: Vec<SubtitleLine>, texts: Vec<String>) -> CoreResult<String> {
    let mut out = Vec::with_capacity(lines.len());
    for (line, text) in lines.into_iter().zip(texts) {
        let words = if text.is_empty() { Vec::new() } else { vec![Word::new(text, line.start, line.end.max(line.start + 0.001))?] };
        out.push(SubtitleLine::new(line.start, line.end, words).with_speaker(line.speaker));
    }
    Ok(to_srt(&out))
}

/// Replace every line's text with its translation, preserving timing and
/// speaker labels.
pub async fn translate_srt(srt_text: &str, translator: &dyn Translator, src: &str, tgt: &str) -> CoreResult<String> {
    let lines = parse_srt(srt_text)?;
    let texts: Vec<String> = lines.iter().map(|l| l.text()).collect();
    let translated = translator.translate_batch(&texts, src, tgt).await;
    lines_to_srt(lines, translated)
}

/// Replace every line's text with `"{original}{separator}{translated}"`,
/// the conventional way to render a two-language subtitle cue (the
/// separator defaults to ASS/libass's forced line-break tag `\N`, which
/// most SRT renderers also honor).
pub async fn translate_srt_bilingual(
    srt_text: &str,
    translator: &dyn Translator,
    src: &str,
    tgt: &str,
    separator: &str,
) -> CoreResult<String> {
    let lines = parse_srt(srt_text)?;
    let originals: Vec<String> = lines.iter().map(|l| l.text()).collect();
    let translated = translator.translate_batch(&originals, src, tgt).await;
    let combined: Vec<String> = originals.iter().zip(translated.iter()).map(|(o, t)| format!("{o}{separator}{t}")).collect();
    lines_to_srt(lines, combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperTranslator;

    #[async_trait]
    impl Translator for UpperTranslator {
        async fn translate_batch(&self, texts: &[String], _src: &str, _tgt: &str) -> Vec<String> {
            texts.iter().map(|t| t.to_uppercase()).collect()
        }
    }

    #[tokio::test]
    async fn translate_srt_preserves_order_and_cue_count() {
        let srt = "00:00:00,000 --> 00:00:01,000\nhello\n\n00:00:01,500 --> 00:00:02,500\nworld\n";
        let out = translate_srt(srt, &UpperTranslator, "en", "es").await.unwrap();
        assert!(out.contains("HELLO"));
        assert!(out.contains("WORLD"));
        assert_eq!(out.matches("--> ").count(), 2);
    }

    #[tokio::test]
    async fn translate_srt_bilingual_combines_original_and_translated() {
        let srt = "00:00:00,000 --> 00:00:01,000\nhi\n";
        let out = translate_srt_bilingual(srt, &UpperTranslator, "en", "es", "\\N").await.unwrap();
        assert!(out.contains("hi\\NHI"));
    }

    #[tokio::test]
    async fn noop_translator_returns_input_unchanged() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = NoOpTranslator.translate_batch(&texts, "en", "fr").await;
        assert_eq!(out, texts);
    }

    struct FakeChatClient {
        content: String,
    }

    #[async_trait]
    impl ChatClient for FakeChatClient {
        async fn create(&self, _model: &str, _system_prompt: &str, _user_content: &str, _temperature: f32) -> anyhow::Result<String> {
            Ok(self.content.clone())
        }
    }

    #[tokio::test]
    async fn cloud_translator_uses_chat_client_response() {
        let client = FakeChatClient { content: json!(["hola"]).to_string() };
        let translator = CloudTranslator::new(Box::new(client), "demo");
        let out = translator.translate_batch(&["hello".to_string()], "en", "es").await;
        assert_eq!(out, vec!["hola".to_string()]);
    }

    struct FailingChatClient;

    #[async_trait]
    impl ChatClient for FailingChatClient {
        async fn create(&self, _model: &str, _system_prompt: &str, _user_content: &str, _temperature: f32) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    #[tokio::test]
    async fn cloud_translator_falls_back_to_original_on_error() {
        let translator = CloudTranslator::new(Box::new(FailingChatClient), "demo");
        let out = translator.translate_batch(&["keep me".to_string()], "en", "fr").await;
        assert_eq!(out, vec!["keep me".to_string()]);
    }
}
