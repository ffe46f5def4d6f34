use super::word::Word;

/// A grouped line of words ready for subtitle rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    pub start: f64,
    pub end: f64,
    pub words: Vec<Word>,
    pub speaker: Option<String>,
}

impl SubtitleLine {
    pub fn new(start: f64, end: f64, words: Vec<Word>) -> Self {
        Self { start, end, words, speaker: None }
    }

    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ").trim().to_string()
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn with_speaker(mut self, speaker: Option<String>) -> Self {
        self.speaker = speaker;
        self
    }
}

/// Thresholds controlling how words are greedily grouped into lines.
#[derive(Debug, Clone, Copy)]
pub struct GroupingConfig {
    pub max_chars_per_line: usize,
    pub max_words_per_line: usize,
    pub max_duration: f64,
    pub max_gap: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self { max_chars_per_line: 40, max_words_per_line: 12, max_duration: 6.0, max_gap: 0.6 }
    }
}

/// Greedily group words into subtitle lines, starting a new line whenever
/// appending the next word would violate any configured bound.
///
/// Grounded on the source's `group_words`: each violation flushes the
/// current line and the offending word starts the next one. An empty line
/// is never emitted.
pub fn group_words(words: &[Word], config: &GroupingConfig) -> Vec<SubtitleLine> {
    let mut lines = Vec::new();
    if words.is_empty() {
        return lines;
    }

    let mut current: Vec<Word> = Vec::new();
    let mut current_start = words[0].start;
    let mut last_end = words[0].end;

    let flush = |current: &mut Vec<Word>, lines: &mut Vec<SubtitleLine>, start: f64, end: f64| {
        if !current.is_empty() {
            lines.push(SubtitleLine::new(start, end, std::mem::take(current)));
        }
    };

    for w in words {
        if current.is_empty() {
            current_start = w.start;
            last_end = w.end;
            current.push(w.clone());
            continue;
        }

        let candidate_text: String = current
            .iter()
            .map(|cw| cw.text.as_str())
            .chain(std::iter::once(w.text.as_str()))
            .collect::<Vec<_>>()
            .join(" ");

        let too_many_chars = candidate_text.chars().count() > config.max_chars_per_line;
        let too_many_words = current.len() + 1 > config.max_words_per_line;
        let too_long = (w.end - current_start) > config.max_duration;
        let too_far = (w.start - last_end) > config.max_gap;

        if too_many_chars || too_many_words || too_long || too_far {
            flush(&mut current, &mut lines, current_start, last_end);
            current_start = w.start;
            last_end = w.end;
            current.push(w.clone());
            continue;
        }

        current.push(w.clone());
        last_end = w.end;
    }

    flush(&mut current, &mut lines, current_start, last_end);
    lines
}
