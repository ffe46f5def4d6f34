use super::format_srt_timestamp;
use crate::domain::subtitle::SubtitleLine;
use crate::domain::word::Word;
use crate::error::{CoreError, CoreResult};
use regex::Regex;
use std::sync::OnceLock;

/// Render subtitle lines as an SRT document: 1-indexed cue number, a
/// `-->` timing line, the cue text (optionally speaker-prefixed), and a
/// blank separator line.
pub fn to_srt(lines: &[SubtitleLine]) -> String {
    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        out.push((idx + 1).to_string());
        out.push(format!("{} --> {}", format_srt_timestamp(line.start), format_srt_timestamp(line.end)));
        let mut text = line.text();
        if let Some(speaker) = &line.speaker {
            text = if text.is_empty() { speaker.clone() } else { format!("{speaker}: {text}") };
        }
        out.push(text);
        out.push(String::new());
    }
    out.join("\n")
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap())
}

fn parse_timestamp(raw: &str) -> CoreResult<f64> {
    let raw = raw.trim();
    let caps = time_regex()
        .captures(raw)
        .ok_or_else(|| CoreError::InvalidTimestamp(raw.to_string()))?;
    let h: f64 = caps[1].parse().unwrap();
    let m: f64 = caps[2].parse().unwrap();
    let s: f64 = caps[3].parse().unwrap();
    let ms: f64 = caps[4].parse().unwrap();
    Ok(h * 3600.0 + m * 60.0 + s + ms / 1000.0)
}

/// Parse an SRT document into subtitle lines. Tolerates an optional leading
/// numeric index line per cue block; each cue collapses to a single
/// synthetic [`Word`] spanning the whole line (word-level timing is not
/// recoverable from SRT).
pub fn parse_srt(text: &str) -> CoreResult<Vec<SubtitleLine>> {
    let mut lines = Vec::new();
    for block in text.trim().split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let mut parts: Vec<&str> = block.lines().collect();
        if parts.first().map(|p| p.trim().chars().all(|c| c.is_ascii_digit()) && !p.trim().is_empty()).unwrap_or(false) {
            parts.remove(0);
        }
        if parts.is_empty() {
            continue;
        }
        let timing = parts[0];
        let content = parts[1..].iter().map(|p| p.trim()).collect::<Vec<_>>().join(" ");
        let (start_raw, end_raw) = timing
            .split_once("-->")
            .ok_or_else(|| CoreError::MalformedSubtitle(format!("missing '-->' in timing line: {timing}")))?;
        let start = parse_timestamp(start_raw)?;
        let end = parse_timestamp(end_raw.trim().split_whitespace().next().unwrap_or(""))?;
        let words = if content.is_empty() { Vec::new() } else { vec![Word::new(content, start, end.max(start + 0.001))?] };
        lines.push(SubtitleLine::new(start, end, words));
    }
    Ok(lines)
}
