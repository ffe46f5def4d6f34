use super::ass::escape_ass_text;
use super::format_ass_timestamp;
use crate::domain::subtitle::SubtitleLine;
use regex::Regex;
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+").unwrap())
}

fn tokenize_for_karaoke(text: &str) -> Vec<String> {
    token_regex().find_iter(text.trim()).map(|m| m.as_str().to_string()).collect()
}

/// Distribute `total_cs` centiseconds across `tokens` proportionally to
/// token length, flooring each allocation at 1cs and pushing the
/// remainder/deficit onto the longest tokens first.
///
/// Grounded on the source's `_allocate_karaoke_durations_cs`: if the cue is
/// too short to give every token at least 1cs, every token gets exactly 1cs
/// instead (word-by-word highlighting beats a zero-duration tag).
fn allocate_karaoke_durations_cs(tokens: &[String], total_cs: i64) -> Vec<i64> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let total_cs = if total_cs <= 0 { tokens.len() as i64 } else { total_cs };

    if total_cs < tokens.len() as i64 {
        return vec![1; tokens.len()];
    }

    let weights: Vec<i64> = tokens.iter().map(|t| (t.chars().count() as i64).max(1)).collect();
    let denom: i64 = weights.iter().sum::<i64>().max(tokens.len() as i64);
    let mut durations: Vec<i64> = weights.iter().map(|w| (total_cs * w / denom).max(1)).collect();

    let mut order: Vec<usize> = (0..tokens.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(weights[i]));

    let mut delta = total_cs - durations.iter().sum::<i64>();
    if delta > 0 {
        let mut i = 0;
        while delta > 0 {
            durations[order[i % order.len()]] += 1;
            delta -= 1;
            i += 1;
        }
    } else if delta < 0 {
        let mut i = 0;
        while delta < 0 && durations.iter().any(|&d| d > 1) {
            let idx = order[i % order.len()];
            if durations[idx] > 1 {
                durations[idx] -= 1;
                delta += 1;
            }
            i += 1;
        }
    }
    durations
}

fn karaoke_text_for_line(line: &SubtitleLine) -> String {
    if line.words.len() > 1 {
        return line
            .words
            .iter()
            .filter(|w| !w.text.trim().is_empty())
            .map(|w| {
                let dur_cs = ((w.end - w.start).max(0.0) * 100.0).round() as i64;
                format!("{{\\k{}}}{}", dur_cs.max(1), escape_ass_text(&w.text))
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    let tokens = tokenize_for_karaoke(&line.text());
    let total_cs = (line.duration().max(0.01) * 100.0).round() as i64;
    let durations = allocate_karaoke_durations_cs(&tokens, total_cs);
    tokens
        .iter()
        .zip(durations.iter())
        .filter(|(t, _)| !t.trim().is_empty())
        .map(|(t, d)| format!("{{\\k{d}}}{}", escape_ass_text(t)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn header() -> Vec<&'static str> {
    vec![
        "[Script Info]",
        "ScriptType: v4.00+",
        "PlayResX: 384",
        "PlayResY: 288",
        "",
        "[V4+ Styles]",
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, \
Alignment, MarginL, MarginR, MarginV, Encoding",
        "Style: Default,Arial,36,&H00FFFFFF,&H0000FFFF,&H00000000,&H64000000,-1,0,0,0,100,100,0,0,1,2,0,2,10,10,10,1",
        "",
        "[Events]",
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text",
    ]
}

/// Render subtitles to ASS with word-by-word `\k` karaoke tags, suitable
/// for libass burn-in.
pub fn to_ass_karaoke(lines: &[SubtitleLine]) -> String {
    let mut out: Vec<String> = header().into_iter().map(str::to_string).collect();
    for line in lines {
        let name = line.speaker.as_deref().unwrap_or("").replace(',', " ");
        let speaker_prefix = line.speaker.as_deref().map(|s| format!("{}: ", escape_ass_text(s))).unwrap_or_default();
        out.push(format!(
            "Dialogue: 0,{},{},Default,{},0,0,0,,{}{}",
            format_ass_timestamp(line.start),
            format_ass_timestamp(line.end),
            name,
            speaker_prefix,
            karaoke_text_for_line(line),
        ));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::word::Word;

    #[test]
    fn allocates_proportionally_to_token_length() {
        let tokens = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let durations = allocate_karaoke_durations_cs(&tokens, 60);
        assert_eq!(durations.iter().sum::<i64>(), 60);
        assert!(durations[2] >= durations[1]);
        assert!(durations[1] >= durations[0]);
    }

    #[test]
    fn floors_each_token_at_one_centisecond_when_cue_too_short() {
        let tokens = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let durations = allocate_karaoke_durations_cs(&tokens, 2);
        assert_eq!(durations, vec![1, 1, 1, 1]);
    }

    #[test]
    fn zero_total_falls_back_to_one_cs_per_token() {
        let tokens = vec!["a".to_string(), "b".to_string()];
        let durations = allocate_karaoke_durations_cs(&tokens, 0);
        assert_eq!(durations.iter().sum::<i64>(), 2);
    }

    #[test]
    fn prefers_real_word_timings_when_multiple_words_present() {
        let words = vec![Word::new("hi", 0.0, 0.5).unwrap(), Word::new("there", 0.5, 1.5).unwrap()];
        let line = SubtitleLine::new(0.0, 1.5, words);
        let karaoke = to_ass_karaoke(&[line]);
        assert!(karaoke.contains("{\\k50}hi"));
        assert!(karaoke.contains("{\\k100}there"));
    }

    #[test]
    fn escapes_braces_in_karaoke_tokens() {
        let line = SubtitleLine::new(0.0, 1.0, vec![Word::new("{oops}", 0.0, 1.0).unwrap()]);
        let karaoke = to_ass_karaoke(&[line]);
        assert!(karaoke.contains("\\{oops\\}"));
    }
}
