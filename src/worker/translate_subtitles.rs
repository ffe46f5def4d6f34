use super::{ensure_not_cancelled, fetch_input, primary_asset, store_derived_asset, PipelineResult};
use crate::api::AppState;
use crate::domain::serialize::{parse_vtt, to_srt};
use crate::domain::translate::{translate_srt, translate_srt_bilingual, ChatClient};
use crate::domain::{CloudTranslator, NoOpTranslator, Translator};
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::tempdir;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// A minimal `chat.completions.create` client over the OpenAI-compatible
/// HTTP API, grounded the same way [`crate::transcribe::openai_whisper`]
/// talks to the Whisper endpoint: a bearer-authed `reqwest::Client` call
/// with the response body parsed as JSON.
struct OpenAiChatClient {
    client: reqwest::Client,
    api_key: String,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn create(&self, model: &str, system_prompt: &str, user_content: &str, temperature: f32) -> anyhow::Result<String> {
        let body = json!({
            "model": model,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content},
            ],
        });
        let response = self.client.post(CHAT_COMPLETIONS_URL).bearer_auth(&self.api_key).json(&body).send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            anyhow::bail!("chat completions error ({status}): {payload}");
        }
        payload["choices"][0]["message"]["content"].as_str().map(str::to_string).ok_or_else(|| anyhow::anyhow!("malformed chat completions response"))
    }
}

/// `tasks.translate_subtitles`: translate every cue of a subtitle asset into
/// `target_language`, optionally keeping the original text alongside it.
///
/// Falls back to [`NoOpTranslator`] (the text comes back unchanged, cue
/// count and timing preserved) whenever `OPENAI_API_KEY` is unset or offline
/// mode is on, with a warning recorded on the job payload rather than a
/// failure — a subtitle job with no translation backend configured should
/// still produce something to review.
pub async fn run(state: &AppState, job: &Job) -> PipelineResult<()> {
    ensure_not_cancelled(state, job.id).await?;
    let asset = primary_asset(state, job).await?;

    let tmp = tempdir()?;
    let source_path = fetch_input(state, &asset, tmp.path()).await?;
    let raw = tokio::fs::read_to_string(&source_path).await?;

    let is_vtt = source_path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("vtt")).unwrap_or(false);
    let srt_text = if is_vtt { to_srt(&parse_vtt(&raw)?) } else { raw };

    let target_language = job
        .payload
        .get("target_language")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("job {} payload missing 'target_language'", job.id))?;
    let source_language = job.payload.get("source_language").and_then(Value::as_str).unwrap_or("auto");
    let bilingual = job.payload.get("bilingual").and_then(Value::as_bool).unwrap_or(false);

    super::progress::report(state, job.id, 0.3, None, Some("translating")).await;

    let mut warnings = Vec::new();
    let api_key = std::env::var("OPENAI_API_KEY").ok();
    let translator: Box<dyn Translator> = match (&api_key, state.settings.offline_mode) {
        (Some(key), false) => {
            Box::new(CloudTranslator::new(Box::new(OpenAiChatClient { client: reqwest::Client::new(), api_key: key.clone() }), "gpt-4o-mini"))
        }
        _ => {
            warnings.push("no translation backend configured; subtitle text returned unchanged".to_string());
            Box::new(NoOpTranslator)
        }
    };

    let translated = if bilingual {
        translate_srt_bilingual(&srt_text, translator.as_ref(), source_language, target_language, "\\N").await?
    } else {
        translate_srt(&srt_text, translator.as_ref(), source_language, target_language).await?
    };

    ensure_not_cancelled(state, job.id).await?;
    let out_path = tmp.path().join("translated.srt");
    tokio::fs::write(&out_path, &translated).await?;

    let output_asset = store_derived_asset(state, "subtitle", &out_path, "application/x-subrip", None).await?;

    let mut payload_patch = json!({"target_language": target_language, "bilingual": bilingual});
    if !warnings.is_empty() {
        payload_patch["warnings"] = json!(warnings);
    }

    job_store::finish_job(&state.pool, job.id, JobStatus::Completed, 1.0, Some(payload_patch), None, Some(output_asset.id)).await?;
    Ok(())
}
