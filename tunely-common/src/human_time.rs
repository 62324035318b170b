//! Human-readable timestamp parsing and formatting
//!
//! Upstream search providers report durations as clock-style strings such as
//! `"3:45"` or `"1:02:10"`. Everything downstream works in whole seconds.

/// Number of colon-separated segments that carry meaning (seconds, minutes, hours)
const MAX_SEGMENTS: usize = 3;

/// Multiplier for each segment, read right-to-left
const SEGMENT_SCALE: [u64; MAX_SEGMENTS] = [1, 60, 3600];

/// Parse a clock-style timestamp into whole seconds.
///
/// Segments are read right-to-left as seconds, minutes, hours. Segments
/// beyond hours are ignored. Empty or absent input yields 0, and a segment
/// that is not a non-negative integer counts as 0. Never fails.
///
/// # Examples
///
/// ```
/// use tunely_common::human_time::parse_timestamp;
///
/// assert_eq!(parse_timestamp("3:45"), 225);
/// assert_eq!(parse_timestamp("1:02:03"), 3723);
/// assert_eq!(parse_timestamp(""), 0);
/// assert_eq!(parse_timestamp(None), 0);
/// ```
pub fn parse_timestamp<'a>(timestamp: impl Into<Option<&'a str>>) -> u64 {
    let Some(timestamp) = timestamp.into() else {
        return 0;
    };

    timestamp
        .trim()
        .rsplit(':')
        .take(MAX_SEGMENTS)
        .zip(SEGMENT_SCALE)
        .map(|(segment, scale)| segment.trim().parse::<u64>().unwrap_or(0).saturating_mul(scale))
        .fold(0u64, u64::saturating_add)
}

/// Format whole seconds as a clock-style timestamp.
///
/// Produces `M:SS` below one hour and `H:MM:SS` otherwise, which is the
/// rendering [`parse_timestamp`] reads back to the same value.
///
/// # Examples
///
/// ```
/// use tunely_common::human_time::format_timestamp;
///
/// assert_eq!(format_timestamp(225), "3:45");
/// assert_eq!(format_timestamp(3723), "1:02:03");
/// assert_eq!(format_timestamp(0), "0:00");
/// ```
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_and_seconds() {
        assert_eq!(parse_timestamp("3:45"), 225);
        assert_eq!(parse_timestamp("0:07"), 7);
        assert_eq!(parse_timestamp("12:00"), 720);
    }

    #[test]
    fn test_hours() {
        assert_eq!(parse_timestamp("1:02:03"), 3723);
        assert_eq!(parse_timestamp("1:02:10"), 3730);
    }

    #[test]
    fn test_seconds_only() {
        assert_eq!(parse_timestamp("59"), 59);
    }

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(parse_timestamp(""), 0);
        assert_eq!(parse_timestamp("   "), 0);
        assert_eq!(parse_timestamp(None), 0);
    }

    #[test]
    fn test_segments_beyond_hours_ignored() {
        // 9 would be "days"; only h:m:s are read
        assert_eq!(parse_timestamp("9:1:00:05"), 3605);
    }

    #[test]
    fn test_non_numeric_segment_counts_as_zero() {
        assert_eq!(parse_timestamp("abc:30"), 30);
        assert_eq!(parse_timestamp("3:xx"), 180);
        assert_eq!(parse_timestamp("LIVE"), 0);
        assert_eq!(parse_timestamp("-1:30"), 30);
    }

    #[test]
    fn test_whitespace_inside_segments() {
        assert_eq!(parse_timestamp(" 3 : 45 "), 225);
    }

    #[test]
    fn test_huge_values_saturate() {
        let parsed = parse_timestamp("99999999999999999999:0:0");
        assert_eq!(parsed, 0, "overflowing segment is not a valid u64 and counts as 0");

        let parsed = parse_timestamp("9999999999999999:0:0");
        assert_eq!(parsed, u64::MAX);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(7), "0:07");
        assert_eq!(format_timestamp(225), "3:45");
        assert_eq!(format_timestamp(3599), "59:59");
        assert_eq!(format_timestamp(3600), "1:00:00");
        assert_eq!(format_timestamp(3723), "1:02:03");
    }

    #[test]
    fn test_reparse_canonical_rendering() {
        for input in ["3:45", "0:00", "1:02:03", "59:59", "10:00:00", "4:5"] {
            let seconds = parse_timestamp(input);
            assert_eq!(parse_timestamp(format_timestamp(seconds).as_str()), seconds, "input {input}");
        }
    }
}
