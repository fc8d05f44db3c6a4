//! LRC timed-text parser.
//!
//! Accepts one timestamp-prefixed line per input line:
//! `[mm:ss.ff]text` where the separator before the fractional part is
//! `.` or `:` and `ff` is 2 or 3 digits. Two-digit fractions are
//! hundredths, right-padded to milliseconds. Lines without a valid
//! timestamp prefix (metadata tags, plain text) are ignored.

use super::{LyricLine, PLACEHOLDER};

/// Parse raw LRC text into a sequence sorted ascending by timestamp.
/// Returns None when no line carried a valid timestamp prefix — the
/// payload is not timed lyrics.
pub fn parse(raw: &str) -> Option<Vec<LyricLine>> {
    let mut lines = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if let Some((time_ms, text)) = parse_line(line) {
            let text = text.trim();
            let text = if text.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                text.to_string()
            };
            lines.push(LyricLine { time_ms, text });
        }
    }

    if lines.is_empty() {
        return None;
    }

    // Stable sort: lines sharing a timestamp keep encounter order.
    lines.sort_by_key(|l| l.time_ms);
    Some(lines)
}

/// Split a `[timestamp]text` line. None when the prefix isn't a timestamp.
fn parse_line(line: &str) -> Option<(u64, &str)> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    let time_ms = parse_timestamp(&rest[..end])?;
    Some((time_ms, &rest[end + 1..]))
}

/// Parse `mm:ss.ff` / `mm:ss:ff` to milliseconds.
fn parse_timestamp(s: &str) -> Option<u64> {
    let (min, rest) = s.split_once(':')?;
    let (sec, frac) = rest.split_once(['.', ':'])?;

    if min.len() != 2 || sec.len() != 2 {
        return None;
    }

    let min: u64 = parse_digits(min)?;
    let sec: u64 = parse_digits(sec)?;
    let ms = match frac.len() {
        // Hundredths, padded to thousandths.
        2 => parse_digits(frac)? * 10,
        3 => parse_digits(frac)?,
        _ => return None,
    };

    Some(min * 60_000 + sec * 1000 + ms)
}

fn parse_digits(s: &str) -> Option<u64> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:12.34"), Some(12_340));
        assert_eq!(parse_timestamp("00:12.340"), Some(12_340));
        assert_eq!(parse_timestamp("00:12:34"), Some(12_340));
        assert_eq!(parse_timestamp("01:30.00"), Some(90_000));
        // No fractional part, wrong widths, non-digits.
        assert_eq!(parse_timestamp("00:12"), None);
        assert_eq!(parse_timestamp("0:12.34"), None);
        assert_eq!(parse_timestamp("00:1.34"), None);
        assert_eq!(parse_timestamp("ar:Artist"), None);
    }

    #[test]
    fn test_parse_skips_untimed_lines() {
        let lrc = "[ti:Test Song]\n[00:12.34]First line\nstray text\n[00:15.00]Second line\n";
        let lines = parse(lrc).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], LyricLine::new(12_340, "First line"));
        assert_eq!(lines[1], LyricLine::new(15_000, "Second line"));
    }

    #[test]
    fn test_parse_sorts_and_keeps_duplicate_order() {
        let lrc = "[00:10.00]late\n[00:02.00]first\n[00:02.00]second\n";
        let lines = parse(lrc).unwrap();
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[1].text, "second");
        assert_eq!(lines[2].text, "late");
        assert!(lines.windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
    }

    #[test]
    fn test_parse_blank_line_gets_placeholder() {
        let lines = parse("[00:05.00]\n[00:06.00]   \n").unwrap();
        assert_eq!(lines[0].text, PLACEHOLDER);
        assert_eq!(lines[1].text, PLACEHOLDER);
    }

    #[test]
    fn test_parse_nothing_timed_is_none() {
        assert!(parse("just some\nplain text\n").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_parse_two_digit_fraction_is_hundredths() {
        let lines = parse("[00:01.50]a").unwrap();
        assert_eq!(lines[0].time_ms, 1500);
    }
}
