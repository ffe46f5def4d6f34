use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// A single word with timing, as produced by a transcription backend.
///
/// Invariant: `end > start`. Constructors enforce this; there is no public
/// way to build a `Word` with non-positive duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> CoreResult<Self> {
        Self::with_probability(text, start, end, None)
    }

    pub fn with_probability(
        text: impl Into<String>,
        start: f64,
        end: f64,
        probability: Option<f32>,
    ) -> CoreResult<Self> {
        if !(end > start) {
            return Err(CoreError::InvalidWord(format!(
                "non-positive duration: start={start}, end={end}"
            )));
        }
        let probability = probability.map(|p| p.clamp(0.0, 1.0));
        Ok(Self { text: text.into(), start, end, probability })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The full output of a transcription backend, normalized into a single
/// canonical shape regardless of which vendor produced it.
///
/// Invariant: `words` is sorted by `start` and pairwise non-overlapping
/// (`words[i].end <= words[i+1].start`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub words: Vec<Word>,
    pub text: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

impl TranscriptionResult {
    /// Build from an unordered collection of words, sorting and validating
    /// non-overlap. Mirrors the source's `TranscriptionResult` validator,
    /// which re-sorts on construction rather than rejecting out-of-order
    /// input outright.
    pub fn from_words(
        mut words: Vec<Word>,
        text: Option<String>,
        model: Option<String>,
        language: Option<String>,
    ) -> CoreResult<Self> {
        words.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
        for pair in words.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.start < prev.end {
                return Err(CoreError::InvalidWord(format!(
                    "words overlap: '{}' [{}, {}) and '{}' [{}, {})",
                    prev.text, prev.start, prev.end, curr.text, curr.start, curr.end
                )));
            }
        }
        Ok(Self { words, text, model, language })
    }

    pub fn duration(&self) -> f64 {
        match (self.words.first(), self.words.last()) {
            (Some(first), Some(last)) => last.end - first.start,
            _ => 0.0,
        }
    }
}
