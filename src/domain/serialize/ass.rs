use super::format_ass_timestamp;
use crate::domain::subtitle::SubtitleLine;

/// Escape backslashes and braces, which would otherwise open an ASS
/// override block inside the dialogue text.
pub(crate) fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('{', "\\{").replace('}', "\\}")
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
        "Style: Default,Arial,36,&H00FFFFFF,&H000000FF,&H00000000,&H64000000,-1,0,0,0,100,100,0,0,1,2,0,2,10,10,10,1",
        "",
        "[Events]",
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text",
    ]
}

/// Render subtitle lines as a basic single-style ASS script, without
/// karaoke timing tags.
pub fn to_ass(lines: &[SubtitleLine]) -> String {
    let mut out: Vec<String> = header().into_iter().map(str::to_string).collect();
    for line in lines {
        let name = line.speaker.as_deref().unwrap_or("").replace(',', " ");
        let speaker_prefix = line.speaker.as_deref().map(|s| format!("{s}: ")).unwrap_or_default();
        out.push(format!(
            "Dialogue: 0,{},{},Default,{},0,0,0,,{}{}",
            format_ass_timestamp(line.start),
            format_ass_timestamp(line.end),
            name,
            speaker_prefix,
            line.text(),
        ));
    }
    out.join("\n")
}
