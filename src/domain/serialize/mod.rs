mod ass;
mod karaoke;
mod srt;
mod vtt;

pub use ass::to_ass;
pub use karaoke::to_ass_karaoke;
pub use srt::{parse_srt, to_srt};
pub use vtt::{parse_vtt, to_vtt};

/// Render a `HH:MM:SS,mmm` timestamp (SRT) from seconds.
pub(crate) fn format_srt_timestamp(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as i64;
    let (hours, rem) = (millis.div_euclid(3_600_000), millis.rem_euclid(3_600_000));
    let (minutes, rem) = (rem.div_euclid(60_000), rem.rem_euclid(60_000));
    let (secs, ms) = (rem.div_euclid(1_000), rem.rem_euclid(1_000));
    format!("{hours:02}:{minutes:02}:{secs:02},{ms:03}")
}

/// Render a `HH:MM:SS.mmm` timestamp (VTT) from seconds.
pub(crate) fn format_vtt_timestamp(seconds: f64) -> String {
    format_srt_timestamp(seconds).replace(',', ".")
}

/// Render a `H:MM:SS.cc` timestamp (ASS, centisecond precision) from seconds.
pub(crate) fn format_ass_timestamp(seconds: f64) -> String {
    let centis = (seconds * 100.0).round() as i64;
    let (hours, rem) = (centis.div_euclid(360_000), centis.rem_euclid(360_000));
    let (minutes, rem) = (rem.div_euclid(6_000), rem.rem_euclid(6_000));
    let (secs, cs) = (rem.div_euclid(100), rem.rem_euclid(100));
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srt_timestamp_formats_hours_minutes_seconds_millis() {
        assert_eq!(format_srt_timestamp(1.5), "00:00:01,500");
        assert_eq!(format_srt_timestamp(3661.123), "01:01:01,123");
    }

    #[test]
    fn vtt_timestamp_uses_dot_separator() {
        assert_eq!(format_vtt_timestamp(1.5), "00:00:01.500");
    }

    #[test]
    fn ass_timestamp_uses_centiseconds() {
        assert_eq!(format_ass_timestamp(61.015), "0:01:01.02");
    }
}
