//! Lyric line types and LRC export.
//!
//! A lyric sequence is an ordered list of `[timestamp, text]` lines,
//! non-decreasing by timestamp. Blank lines carry a musical-note
//! placeholder so downstream consumers never render empty text.

pub mod parser;

use serde::{Deserialize, Serialize};

use crate::host::TrackIdentity;

/// Shown in place of an empty lyric line (instrumental breaks etc.).
pub const PLACEHOLDER: &str = "♪";

/// A single timed lyric line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time_ms: u64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            time_ms,
            text: text.into(),
        }
    }
}

/// Render a cached sequence as an LRC document: metadata header block,
/// blank line, then one timed line per entry. The per-track offset is
/// applied additively to each timestamp before formatting, clamped so a
/// negative offset can't push a timestamp below zero.
pub fn export_lrc(track: &TrackIdentity, lines: &[LyricLine], offset_ms: i64) -> String {
    let mut out = String::new();
    out.push_str(&format!("[ar: {}]\n", track.artist));
    out.push_str(&format!("[ti: {}]\n", track.title));
    out.push_str(&format!("[al: {}]\n", track.album));
    out.push_str(&format!("[offset: {}]\n", offset_ms));
    out.push('\n');

    for line in lines {
        let shifted = (line.time_ms as i64 + offset_ms).max(0) as u64;
        out.push_str(&format_timestamp(shifted));
        out.push_str(&line.text);
        out.push('\n');
    }

    out
}

/// Format milliseconds as an LRC timestamp `[mm:ss.xx]` (hundredths).
pub fn format_timestamp(time_ms: u64) -> String {
    let min = time_ms / 60_000;
    let sec = (time_ms % 60_000) / 1000;
    let hundredths = (time_ms % 1000) / 10;
    format!("[{:02}:{:02}.{:02}]", min, sec, hundredths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> TrackIdentity {
        TrackIdentity {
            uri: "test:1".into(),
            title: "Foo".into(),
            artist: "A".into(),
            album: "B".into(),
            duration_ms: 200_000,
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "[00:00.00]");
        assert_eq!(format_timestamp(1000), "[00:01.00]");
        assert_eq!(format_timestamp(90_340), "[01:30.34]");
    }

    #[test]
    fn test_export_applies_offset() {
        let lines = vec![LyricLine::new(1000, "Hi"), LyricLine::new(2500, "There")];
        let lrc = export_lrc(&track(), &lines, -200);

        assert!(lrc.starts_with("[ar: A]\n[ti: Foo]\n[al: B]\n[offset: -200]\n\n"));
        assert!(lrc.contains("[00:00.80]Hi"));
        assert!(lrc.contains("[00:02.30]There"));
    }

    #[test]
    fn test_export_clamps_at_zero() {
        let lines = vec![LyricLine::new(100, "early")];
        let lrc = export_lrc(&track(), &lines, -500);
        assert!(lrc.contains("[00:00.00]early"));
    }
}
