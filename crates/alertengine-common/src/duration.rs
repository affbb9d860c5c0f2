//! Suffixed duration strings (`"30s"`, `"5m"`, `"1h30m"`, `"250ms"`).
//!
//! This is the format the gateway uses for rule `for` durations and the
//! config file uses for intervals.

use std::time::Duration;

/// Parse a suffixed duration string. Units: `ms`, `s`, `m`, `h`, `d`;
/// compound forms like `"1h30m"` are accepted. Returns `None` for the
/// empty string, unknown units, or trailing garbage.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let (unit_len, unit_ms) = if rest.starts_with("ms") {
            (2, 1)
        } else if rest.starts_with('s') {
            (1, 1_000)
        } else if rest.starts_with('m') {
            (1, 60_000)
        } else if rest.starts_with('h') {
            (1, 3_600_000)
        } else if rest.starts_with('d') {
            (1, 86_400_000)
        } else {
            return None;
        };
        rest = &rest[unit_len..];
        total += Duration::from_millis(value.checked_mul(unit_ms)?);
    }

    Some(total)
}

/// Parse a rule `for` duration. Malformed values collapse to zero, which
/// makes the rule fire on its first present evaluation.
pub fn parse_for_duration(s: &str) -> Duration {
    parse_duration(s).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_units() {
        assert_eq!(parse_duration("120s"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn compound_form() {
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("10x"), None);
        assert_eq!(parse_duration("10s extra"), None);
    }

    #[test]
    fn for_duration_collapses_to_zero() {
        assert_eq!(parse_for_duration(""), Duration::ZERO);
        assert_eq!(parse_for_duration("nonsense"), Duration::ZERO);
        assert_eq!(parse_for_duration("90s"), Duration::from_secs(90));
    }
}
