use super::format_vtt_timestamp;
use crate::domain::subtitle::SubtitleLine;
use crate::domain::word::Word;
use crate::error::{CoreError, CoreResult};
use regex::Regex;
use std::sync::OnceLock;

/// Render subtitle lines as a WebVTT document with the mandatory `WEBVTT`
/// header and a blank line between cues.
pub fn to_vtt(lines: &[SubtitleLine]) -> String {
    let mut out = vec!["WEBVTT".to_string(), String::new()];
    for line in lines {
        out.push(format!("{} --> {}", format_vtt_timestamp(line.start), format_vtt_timestamp(line.end)));
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
    RE.get_or_init(|| Regex::new(r"(\d{2,}):(\d{2}):(\d{2})[.,](\d{3})").unwrap())
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

/// Parse a WebVTT document into subtitle lines. Tolerates the `WEBVTT`
/// header, `NOTE` comment blocks, cue identifiers preceding the timing line,
/// and trailing cue settings (`align:`, `position:`, ...) after the second
/// timestamp — all of which the source's hand-rolled parser skips rather
/// than rejecting.
pub fn parse_vtt(text: &str) -> CoreResult<Vec<SubtitleLine>> {
    let mut lines = Vec::new();
    for block in text.replace("\r\n", "\n").split("\n\n").map(str::trim) {
        if block.is_empty() || block.starts_with("WEBVTT") || block.starts_with("NOTE") {
            continue;
        }
        let block_lines: Vec<&str> = block.lines().collect();
        let timing_idx = block_lines.iter().position(|l| l.contains("-->"));
        let Some(timing_idx) = timing_idx else { continue };
        let timing = block_lines[timing_idx];
        let content = block_lines[timing_idx + 1..].iter().map(|l| l.trim()).collect::<Vec<_>>().join(" ");

        let (start_raw, rest) = timing
            .split_once("-->")
            .ok_or_else(|| CoreError::MalformedSubtitle(format!("missing '-->' in timing line: {timing}")))?;
        let end_raw = rest.trim().split_whitespace().next().unwrap_or("");
        let start = parse_timestamp(start_raw)?;
        let end = parse_timestamp(end_raw)?;
        let words = if content.is_empty() { Vec::new() } else { vec![Word::new(content, start, end.max(start + 0.001))?] };
        lines.push(SubtitleLine::new(start, end, words));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(start: f64, end: f64, text: &str) -> SubtitleLine {
        SubtitleLine::new(start, end, vec![Word::new(text, start, end).unwrap()])
    }

    #[test]
    fn emits_webvtt_header() {
        let vtt = to_vtt(&[line(0.0, 1.0, "hi")]);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:01.000"));
    }

    #[test]
    fn parses_cue_identifiers_and_settings() {
        let text = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000 align:start position:10%\nhello there\n";
        let parsed = parse_vtt(text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text(), "hello there");
        assert!((parsed[0].start - 1.0).abs() < 1e-3);
    }

    #[test]
    fn skips_note_blocks() {
        let text = "WEBVTT\n\nNOTE this is a comment\n\n00:00:00.000 --> 00:00:01.000\nhi\n";
        let parsed = parse_vtt(text).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn round_trips_cue_count_and_timings() {
        let lines = vec![line(0.0, 2.0, "one"), line(2.5, 4.0, "two")];
        let vtt = to_vtt(&lines);
        let parsed = parse_vtt(&vtt).unwrap();
        assert_eq!(parsed.len(), lines.len());
    }
}
