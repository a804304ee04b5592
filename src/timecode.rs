/// Timestamp parsing and formatting for description chapters and transcript panels
use regex::Regex;
use std::sync::OnceLock;

/// Matches "M:SS", "MM:SS" or "H:MM:SS" anywhere in a piece of text
fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}(?::\d{2}){1,2})").expect("valid timestamp regex"))
}

/// Parse a bare timestamp string into seconds.
///
/// Accepts `M:SS`, `MM:SS` and `H:MM:SS`. Returns `None` for anything else,
/// including minute/second fields of 60 or more and totals that do not fit
/// in a `u32` number of seconds.
pub fn parse_timestamp(timestamp_str: &str) -> Option<f64> {
    let parts: Vec<&str> = timestamp_str.trim().split(':').collect();
    let numbers: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let total = match numbers.as_slice() {
        [minutes, seconds] if *seconds < 60 => minutes.checked_mul(60)?.checked_add(*seconds)?,
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => hours
            .checked_mul(3600)?
            .checked_add(minutes * 60 + seconds)?,
        _ => return None,
    };
    Some(f64::from(total))
}

/// Find the first timestamp embedded in `text` and return it in seconds
pub fn find_timestamp(text: &str) -> Option<f64> {
    timestamp_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_timestamp(m.as_str()))
}

/// Whether `text` contains anything that looks like a timestamp
pub fn contains_timestamp(text: &str) -> bool {
    timestamp_regex().is_match(text)
}

/// Format seconds as `M:SS`, or `H:MM:SS` past the hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("0:00"), Some(0.0));
        assert_eq!(parse_timestamp("1:05"), Some(65.0));
        assert_eq!(parse_timestamp("12:30"), Some(750.0));
        assert_eq!(parse_timestamp("1:02:03"), Some(3723.0));
        assert_eq!(parse_timestamp(" 2:10 "), Some(130.0));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("abc"), None);
        assert_eq!(parse_timestamp("1:75"), None);
        assert_eq!(parse_timestamp("1:2:3:4"), None);
        assert_eq!(parse_timestamp("42"), None);
    }

    #[test]
    fn test_parse_timestamp_overflow_is_rejected() {
        assert_eq!(parse_timestamp("99999999:00"), None);
        assert_eq!(parse_timestamp("4000000:00:00"), None);
        assert_eq!(parse_timestamp("4294967295:59"), None);
        // Largest values that still fit
        assert_eq!(parse_timestamp("71582788:15"), Some(4294967295.0));
        assert_eq!(parse_timestamp("1193046:28:15"), Some(4294967295.0));
    }

    #[test]
    fn test_find_timestamp_in_text() {
        assert_eq!(find_timestamp("3:15 Sponsor: VPN"), Some(195.0));
        assert_eq!(find_timestamp("Intro at 1:00:00 sharp"), Some(3600.0));
        assert_eq!(find_timestamp("no time here"), None);
        assert!(contains_timestamp("00:42"));
        assert!(!contains_timestamp("Sponsor"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(65.0), "1:05");
        assert_eq!(format_timestamp(3723.4), "1:02:03");
        assert_eq!(format_timestamp(-3.0), "0:00");
    }
}
