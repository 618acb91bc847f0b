//! Classification of engine status lines.
//!
//! The engine is run with `-progress pipe:1`, so stdout carries `key=value`
//! progress blocks, and with `-loglevel level+info`, so stderr carries log
//! lines such as
//!
//! ```text
//! [segment @ 0x5581c0] [info] Opening 'recordings/game_002.mp4' for writing
//! ```
//!
//! Every line is classified into a [`StatusLine`]; anything not understood
//! is [`StatusLine::Unrecognized`] and ignored by the reporter.

use std::time::Duration;

use hg_core::SegmentPattern;

/// What a single engine status line means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    /// The engine reported how much media it has written.
    Progress {
        /// Media timestamp of the output so far.
        out_time: Duration,
    },
    /// The engine opened the segment file with this index for writing.
    SegmentBoundary { index: u32 },
    /// Anything else.
    Unrecognized,
}

/// Stateless classifier for engine status lines.
#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    pattern: Option<SegmentPattern>,
}

impl StatusClassifier {
    /// Create a classifier. Segment boundaries are only recognised when a
    /// segment pattern is given, and only for files matching it exactly.
    pub fn new(pattern: Option<SegmentPattern>) -> Self {
        Self { pattern }
    }

    pub fn classify(&self, line: &str) -> StatusLine {
        let line = line.trim();

        // `out_time_ms` is also microseconds, despite its name.
        if let Some(val) = line
            .strip_prefix("out_time_us=")
            .or_else(|| line.strip_prefix("out_time_ms="))
        {
            return parse_micros(val);
        }
        if let Some(out_time) = stats_time(line) {
            return StatusLine::Progress { out_time };
        }
        if let Some(index) = self.opened_segment(line) {
            return StatusLine::SegmentBoundary { index };
        }

        StatusLine::Unrecognized
    }

    fn opened_segment(&self, line: &str) -> Option<u32> {
        let pattern = self.pattern.as_ref()?;
        let start = line.find("Opening '")? + "Opening '".len();
        let rest = &line[start..];
        let end = rest.rfind("' for writing")?;
        let path = &rest[..end];
        let file_name = path.rsplit(['/', '\\']).next()?;
        pattern.match_index(file_name)
    }
}

fn parse_micros(val: &str) -> StatusLine {
    match val.trim().parse::<u64>() {
        Ok(us) => StatusLine::Progress {
            out_time: Duration::from_micros(us),
        },
        // "N/A" or a negative value before the first packet.
        Err(_) => StatusLine::Unrecognized,
    }
}

/// Parse the `time=HH:MM:SS.cc` field of a classic stats line.
fn stats_time(line: &str) -> Option<Duration> {
    if !line.starts_with("frame=") && !line.starts_with("size=") {
        return None;
    }
    let field = line.split_whitespace().find_map(|f| f.strip_prefix("time="))?;
    parse_clock(field)
}

fn parse_clock(text: &str) -> Option<Duration> {
    let mut parts = text.splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) || minutes >= 60 {
        return None;
    }
    let whole = hours.checked_mul(3600)?.checked_add(minutes * 60)?;
    Duration::from_secs(whole).checked_add(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenting() -> StatusClassifier {
        StatusClassifier::new(Some(SegmentPattern::parse("game_%03d.mp4").unwrap()))
    }

    #[test]
    fn progress_key() {
        let c = StatusClassifier::default();
        assert_eq!(
            c.classify("out_time_us=65000000"),
            StatusLine::Progress {
                out_time: Duration::from_secs(65)
            }
        );
        assert_eq!(
            c.classify("out_time_ms=1500000"),
            StatusLine::Progress {
                out_time: Duration::from_millis(1500)
            }
        );
        assert_eq!(c.classify("out_time_us=N/A"), StatusLine::Unrecognized);
        assert_eq!(c.classify("out_time_us=-9223372036854775807"), StatusLine::Unrecognized);
    }

    #[test]
    fn stats_line() {
        let c = StatusClassifier::default();
        assert_eq!(
            c.classify("frame= 1500 fps= 30 q=-1.0 size=   20480kB time=00:01:02.50 bitrate=2684.4kbits/s speed=1.0x"),
            StatusLine::Progress {
                out_time: Duration::from_millis(62_500)
            }
        );
        assert_eq!(
            c.classify("size=N/A time=00:00:03.00 bitrate=N/A speed=1x"),
            StatusLine::Progress {
                out_time: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn segment_opening() {
        let c = segmenting();
        assert_eq!(
            c.classify("[segment @ 0x5581c0] [info] Opening 'recordings/game_002.mp4' for writing"),
            StatusLine::SegmentBoundary { index: 2 }
        );
        assert_eq!(
            c.classify("[segment @ 0x5581c0] Opening '/abs/path/game_010.mp4' for writing"),
            StatusLine::SegmentBoundary { index: 10 }
        );
    }

    #[test]
    fn input_openings_are_not_boundaries() {
        let c = segmenting();
        assert_eq!(
            c.classify("[hls @ 0x1] [info] Opening 'https://cdn.example/seg_002.ts' for reading"),
            StatusLine::Unrecognized
        );
        assert_eq!(
            c.classify("[hls @ 0x1] Opening 'https://cdn.example/live_123.m3u8' for reading"),
            StatusLine::Unrecognized
        );
    }

    #[test]
    fn foreign_files_are_not_boundaries() {
        let c = segmenting();
        assert_eq!(
            c.classify("[segment @ 0x1] Opening 'recordings/other_002.mp4' for writing"),
            StatusLine::Unrecognized
        );
    }

    #[test]
    fn no_pattern_means_no_boundaries() {
        let c = StatusClassifier::default();
        assert_eq!(
            c.classify("[segment @ 0x1] Opening 'recordings/game_002.mp4' for writing"),
            StatusLine::Unrecognized
        );
    }

    #[test]
    fn garbage_is_unrecognized() {
        let c = segmenting();
        for line in [
            "",
            "progress=continue",
            "bitrate=N/A",
            "frame=",
            "\u{fffd}\u{fffd}",
            "frame=1 time=99999999999999999:00:00.00 bitrate=N/A",
            "size=N/A time=18446744073709551615:59:59.99",
            "frame=1 time=00:75:00.00",
        ] {
            assert_eq!(c.classify(line), StatusLine::Unrecognized, "{line:?}");
        }
    }
}
