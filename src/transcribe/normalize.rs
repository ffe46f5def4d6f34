//! Vendor-specific transcription payload shapes, normalized into the
//! canonical [`TranscriptionResult`].
//!
//! Every backend here accepts the raw response shape it actually produces
//! and tolerates the same malformed-entry skipping the source backends do:
//! a word missing a required field is dropped rather than failing the
//! whole transcription.

use crate::domain::{TranscriptionResult, Word};
use serde_json::Value;

/// Vendor/UI-facing model aliases mapped to the name the actually-configured
/// backend expects. Covers the OpenAI-style `whisper-<size>[.en]` spelling
/// against the bare size names `faster-whisper`/`whisper.cpp`/
/// `whisper-timestamped` sidecars take on the command line.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("whisper-large-v3", "large-v3"),
    ("whisper-large-v2", "large-v2"),
    ("whisper-large", "large"),
    ("whisper-medium.en", "medium.en"),
    ("whisper-medium", "medium"),
    ("whisper-small.en", "small.en"),
    ("whisper-small", "small"),
    ("whisper-base.en", "base.en"),
    ("whisper-base", "base"),
    ("whisper-tiny.en", "tiny.en"),
    ("whisper-tiny", "tiny"),
];

/// Normalize a model name through the alias table before it reaches any
/// backend. Names with no entry (including OpenAI's own `whisper-1`) pass
/// through unchanged.
pub fn normalize_model_name(model: &str) -> String {
    MODEL_ALIASES.iter().find(|(from, _)| *from == model).map(|(_, to)| to.to_string()).unwrap_or_else(|| model.to_string())
}

fn parse_f64(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn parse_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn build_result(words: Vec<Word>, text: Option<String>, model: Option<String>, language: Option<String>) -> TranscriptionResult {
    // Vendor outputs occasionally carry duplicate or jittered word boundaries;
    // sorting and silently dropping the offending tail instead of erroring
    // keeps a single malformed word from discarding an entire transcript.
    let mut sorted = words;
    sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    let mut accepted: Vec<Word> = Vec::with_capacity(sorted.len());
    for w in sorted {
        if let Some(last) = accepted.last() {
            if w.start < last.end {
                continue;
            }
        }
        accepted.push(w);
    }
    TranscriptionResult { words: accepted, text, model, language }
}

/// Normalize an OpenAI `verbose_json` transcription response:
/// `{text, language, duration, segments: [{words: [{word, start, end, probability}]}]}`.
pub fn normalize_verbose_json(payload: &Value, model: Option<String>, language: Option<String>) -> TranscriptionResult {
    let mut words = Vec::new();
    if let Some(segments) = payload.get("segments").and_then(Value::as_array) {
        for segment in segments {
            let Some(seg_words) = segment.get("words").and_then(Value::as_array) else { continue };
            for w in seg_words {
                let (Some(start), Some(end), Some(text)) = (
                    w.get("start").and_then(parse_f64),
                    w.get("end").and_then(parse_f64),
                    w.get("word").and_then(parse_text),
                ) else {
                    continue;
                };
                if end <= start {
                    continue;
                }
                let probability = w.get("probability").and_then(parse_f64).map(|p| p as f32);
                if let Ok(word) = Word::with_probability(text, start, end, probability) {
                    words.push(word);
                }
            }
        }
    }
    let text = payload.get("text").and_then(parse_text);
    build_result(words, text, model, language)
}

/// Normalize faster-whisper segments:
/// `[{text, words: [{word, start, end, probability}]}]`.
pub fn normalize_faster_whisper(segments: &[Value], model: Option<String>, language: Option<String>) -> TranscriptionResult {
    let mut words = Vec::new();
    let mut texts = Vec::new();
    for segment in segments {
        if let Some(t) = segment.get("text").and_then(parse_text) {
            if !t.is_empty() {
                texts.push(t);
            }
        }
        let Some(seg_words) = segment.get("words").and_then(Value::as_array) else { continue };
        for w in seg_words {
            let (Some(start), Some(end), Some(text)) = (
                w.get("start").and_then(parse_f64),
                w.get("end").and_then(parse_f64),
                w.get("word").and_then(parse_text),
            ) else {
                continue;
            };
            if end <= start {
                continue;
            }
            let probability = w.get("probability").and_then(parse_f64).map(|p| p as f32);
            if let Ok(word) = Word::with_probability(text, start, end, probability) {
                words.push(word);
            }
        }
    }
    let text = if texts.is_empty() { None } else { Some(texts.join(" ")) };
    build_result(words, text, model, language)
}

/// Normalize whisper.cpp-style segments: `[{text, t_start, t_end, tokens:
/// [{text, t_start, t_end}]}]`. Falls back to one word per segment when a
/// segment carries no token-level breakdown.
pub fn normalize_whisper_cpp(segments: &[Value], model: Option<String>, language: Option<String>) -> TranscriptionResult {
    let mut words = Vec::new();
    let mut texts = Vec::new();
    for segment in segments {
        if let Some(t) = segment.get("text").and_then(parse_text) {
            if !t.is_empty() {
                texts.push(t);
            }
        }
        match segment.get("tokens").and_then(Value::as_array) {
            Some(tokens) if !tokens.is_empty() => {
                for tok in tokens {
                    let (Some(start), Some(end), Some(text)) = (
                        tok.get("t_start").and_then(parse_f64),
                        tok.get("t_end").and_then(parse_f64),
                        tok.get("text").and_then(parse_text),
                    ) else {
                        continue;
                    };
                    if end <= start || text.is_empty() {
                        continue;
                    }
                    if let Ok(word) = Word::new(text, start, end) {
                        words.push(word);
                    }
                }
            }
            _ => {
                let (Some(start), Some(end), Some(text)) = (
                    segment.get("t_start").and_then(parse_f64),
                    segment.get("t_end").and_then(parse_f64),
                    segment.get("text").and_then(parse_text),
                ) else {
                    continue;
                };
                if end > start && !text.is_empty() {
                    if let Ok(word) = Word::new(text, start, end) {
                        words.push(word);
                    }
                }
            }
        }
    }
    let text = if texts.is_empty() { None } else { Some(texts.join(" ")) };
    build_result(words, text, model, language)
}

/// Normalize whisper-timestamped / whisperX-style output:
/// `{text, segments: [{text, words: [{word|text, start, end, probability|score}]}]}`.
pub fn normalize_whisper_timestamped(payload: &Value, model: Option<String>, language: Option<String>) -> TranscriptionResult {
    let segments = payload
        .get("segments")
        .and_then(Value::as_array)
        .cloned()
        .or_else(|| payload.as_array().cloned())
        .unwrap_or_default();

    let mut words = Vec::new();
    let mut texts = Vec::new();
    for segment in &segments {
        if let Some(t) = segment.get("text").and_then(parse_text) {
            if !t.is_empty() {
                texts.push(t);
            }
        }
        let Some(seg_words) = segment.get("words").and_then(Value::as_array) else { continue };
        for w in seg_words {
            let (Some(start), Some(end)) = (w.get("start").and_then(parse_f64), w.get("end").and_then(parse_f64)) else {
                continue;
            };
            let text = w.get("word").and_then(parse_text).or_else(|| w.get("text").and_then(parse_text)).unwrap_or_default();
            if end <= start || text.is_empty() {
                continue;
            }
            let probability = w
                .get("probability")
                .and_then(parse_f64)
                .or_else(|| w.get("score").and_then(parse_f64))
                .map(|p| p as f32);
            if let Ok(word) = Word::with_probability(text, start, end, probability) {
                words.push(word);
            }
        }
    }

    let text = payload
        .get("text")
        .and_then(parse_text)
        .filter(|s| !s.is_empty())
        .or_else(|| if texts.is_empty() { None } else { Some(texts.join(" ")) });
    build_result(words, text, model, language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_openai_verbose_json() {
        let payload = json!({
            "text": "hello world",
            "segments": [{
                "words": [
                    {"word": "hello", "start": 0.0, "end": 0.5, "probability": 0.9},
                    {"word": "world", "start": 0.5, "end": 1.0, "probability": 0.95},
                ]
            }]
        });
        let result = normalize_verbose_json(&payload, Some("whisper-1".to_string()), Some("en".to_string()));
        assert_eq!(result.words.len(), 2);
        assert_eq!(result.words[0].text, "hello");
        assert_eq!(result.text.as_deref(), Some("hello world"));
    }

    #[test]
    fn skips_malformed_openai_words() {
        let payload = json!({
            "segments": [{"words": [{"word": "ok", "start": 0.0, "end": 1.0}, {"word": "bad"}]}]
        });
        let result = normalize_verbose_json(&payload, None, None);
        assert_eq!(result.words.len(), 1);
    }

    #[test]
    fn normalizes_faster_whisper_segments() {
        let segments = vec![json!({
            "text": "hi there",
            "words": [{"word": "hi", "start": 0.0, "end": 0.3}, {"word": "there", "start": 0.3, "end": 0.8}]
        })];
        let result = normalize_faster_whisper(&segments, None, None);
        assert_eq!(result.words.len(), 2);
        assert_eq!(result.text.as_deref(), Some("hi there"));
    }

    #[test]
    fn normalizes_whisper_cpp_tokens() {
        let segments = vec![json!({
            "text": "hi",
            "tokens": [{"text": "hi", "t_start": 0.0, "t_end": 0.5}]
        })];
        let result = normalize_whisper_cpp(&segments, None, None);
        assert_eq!(result.words.len(), 1);
    }

    #[test]
    fn falls_back_to_segment_level_word_when_no_tokens() {
        let segments = vec![json!({"text": "hi there", "t_start": 0.0, "t_end": 1.0, "tokens": []})];
        let result = normalize_whisper_cpp(&segments, None, None);
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].text, "hi there");
    }

    #[test]
    fn normalizes_whisper_timestamped_dict() {
        let payload = json!({
            "text": "hi there",
            "segments": [{"text": "hi there", "words": [
                {"word": "hi", "start": 0.0, "end": 0.4, "score": 0.8},
                {"text": "there", "start": 0.4, "end": 1.0},
            ]}]
        });
        let result = normalize_whisper_timestamped(&payload, None, None);
        assert_eq!(result.words.len(), 2);
        assert_eq!(result.words[0].probability, Some(0.8));
    }

    #[test]
    fn aliases_vendor_style_model_names_to_bare_sizes() {
        assert_eq!(normalize_model_name("whisper-large-v3"), "large-v3");
        assert_eq!(normalize_model_name("whisper-tiny.en"), "tiny.en");
    }

    #[test]
    fn leaves_unaliased_model_names_unchanged() {
        assert_eq!(normalize_model_name("whisper-1"), "whisper-1");
        assert_eq!(normalize_model_name("large-v3"), "large-v3");
    }

    #[test]
    fn drops_overlapping_words_after_sort() {
        let segments = vec![json!({
            "words": [
                {"word": "b", "start": 1.0, "end": 2.0},
                {"word": "a", "start": 0.0, "end": 1.5},
            ]
        })];
        let result = normalize_faster_whisper(&segments, None, None);
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].text, "a");
    }
}
