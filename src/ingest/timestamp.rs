use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Digit-only values below this are Unix seconds, at or above it Unix milliseconds.
pub const UNIX_MILLIS_THRESHOLD: i64 = 2_000_000_000;

/// Datetime layouts tried in order after the Unix-time rule.
const PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parse a timestamp cell into a naive datetime.
///
/// Unix times are converted to UTC wall-clock; layouts carrying an offset keep
/// the wall-clock time as written. Returns `None` when no rule matches.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim().trim_matches('"').trim_end_matches('.').trim();
    if value.is_empty() {
        return None;
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        return parse_unix(value);
    }

    PATTERNS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(value, pattern).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_unix(digits: &str) -> Option<NaiveDateTime> {
    let value: i64 = digits.parse().ok()?;
    let utc = if value < UNIX_MILLIS_THRESHOLD {
        DateTime::from_timestamp(value, 0)?
    } else {
        DateTime::from_timestamp_millis(value)?
    };
    Some(utc.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_unix_seconds_and_millis_agree() {
        let seconds = parse_timestamp("1700000000").unwrap();
        let millis = parse_timestamp("1700000000000").unwrap();

        assert_eq!(seconds, at(2023, 11, 14, 22, 13, 20));
        assert_eq!(seconds, millis);
    }

    #[test]
    fn test_threshold_boundary() {
        // just below the threshold: seconds, far in the future
        let below = parse_timestamp("1999999999").unwrap();
        assert_eq!(below.date(), NaiveDate::from_ymd_opt(2033, 5, 18).unwrap());

        // at the threshold: milliseconds, early 1970
        let at_threshold = parse_timestamp("2000000000").unwrap();
        assert_eq!(at_threshold, at(1970, 1, 24, 3, 33, 20));
    }

    #[rstest]
    #[case("2024-06-01 10:15:00", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024-06-01T10:15:00", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024-06-01 10:15:00.500", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024-06-01T10:15", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024-06-01 10:15", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024/06/01 10:15:30", at(2024, 6, 1, 10, 15, 30))]
    #[case("01/06/2024 10:15", at(2024, 6, 1, 10, 15, 0))]
    #[case("01.06.2024 10:15:00", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024-06-01T10:15:00+02:00", at(2024, 6, 1, 10, 15, 0))]
    #[case("2024-06-01", at(2024, 6, 1, 0, 0, 0))]
    #[case(" \"2024-06-01 10:15:00.\" ", at(2024, 6, 1, 10, 15, 0))]
    fn test_supported_layouts(#[case] raw: &str, #[case] expected: NaiveDateTime) {
        let parsed = parse_timestamp(raw).unwrap();
        assert_eq!(parsed.date(), expected.date());
        assert_eq!(parsed.format("%H:%M").to_string(), expected.format("%H:%M").to_string());
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-45 99:00")]
    #[case("12ab")]
    fn test_rejects_garbage(#[case] raw: &str) {
        assert_eq!(parse_timestamp(raw), None);
    }
}
