//! Timestamp parsing and human-readable durations.
//!
//! Timestamps stay raw strings on the model; they are parsed only when a
//! metric needs them. Unparseable input is never repaired, it just turns the
//! affected value into `"N/A"`.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Placeholder shown for any value that cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Parses an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (with offset) and naive `YYYY-MM-DDTHH:MM:SS[.f]`, which is
/// read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Signed number of seconds from `start` to `end`, if both parse.
pub fn seconds_between(start: &str, end: &str) -> Option<f64> {
    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    Some(millis_between(start, end) / 1000.0)
}

pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64
}

/// Renders `value` with `decimals` places, rounding halves away from zero.
fn fixed(value: f64, decimals: usize) -> String {
    let scale = 10f64.powi(decimals as i32);
    format!("{:.*}", decimals, (value * scale).round() / scale)
}

/// Formats a span of seconds for run and test summaries.
///
/// Negative, zero and non-finite spans have no meaningful rendering and
/// become `"N/A"`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return NOT_AVAILABLE.to_string();
    }
    if seconds < 60.0 {
        return format!("{}s", fixed(seconds, 1));
    }
    let minutes = (seconds / 60.0).floor() as u64;
    format!("{}m {}s", minutes, fixed(seconds % 60.0, 1))
}

/// Formats an average latency given in milliseconds.
pub fn format_response_time(millis: f64) -> String {
    if !millis.is_finite() || millis < 0.0 {
        return NOT_AVAILABLE.to_string();
    }
    let seconds = millis / 1000.0;
    if seconds < 1.0 {
        return format!("{}ms", fixed(millis, 0));
    }
    if seconds < 60.0 {
        return format!("{}s", fixed(seconds, 2));
    }
    let minutes = (seconds / 60.0).floor() as u64;
    format!("{}m {}s", minutes, fixed(seconds % 60.0, 2))
}

/// Elapsed time between two raw timestamps with a fixed number of decimals.
///
/// Unlike [`format_duration`] this keeps zero and negative spans visible, which
/// is how individual test rows are shown.
pub fn format_elapsed(start: &str, end: &str, decimals: usize) -> String {
    match seconds_between(start, end) {
        Some(seconds) => format!("{}s", fixed(seconds, decimals)),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let parsed = parse_timestamp("2026-01-21T10:33:47.250+02:00").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2026, 1, 21, 8, 33, 47).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let parsed = parse_timestamp("2026-01-21T10:33:47.123456").unwrap();
        assert_eq!(parsed.timestamp(), 1_768_991_627);
        assert!(parse_timestamp("2026-01-21 10:33:47").is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday-ish").is_none());
    }

    #[test]
    fn test_format_duration_examples() {
        assert_eq!(format_duration(45.0), "45.0s");
        assert_eq!(format_duration(125.0), "2m 5.0s");
        assert_eq!(format_duration(-1.0), "N/A");
        assert_eq!(format_duration(0.0), "N/A");
        assert_eq!(format_duration(f64::NAN), "N/A");
        assert_eq!(format_duration(3600.5), "60m 0.5s");
    }

    #[test]
    fn test_format_response_time_units() {
        assert_eq!(format_response_time(250.0), "250ms");
        assert_eq!(format_response_time(1500.0), "1.50s");
        assert_eq!(format_response_time(90_000.0), "1m 30.00s");
    }

    #[test]
    fn test_halves_round_up() {
        assert_eq!(format_duration(20.25), "20.3s");
        assert_eq!(format_duration(80.25), "1m 20.3s");
        assert_eq!(format_response_time(2.5), "3ms");
        assert_eq!(format_response_time(1125.0), "1.13s");
        assert_eq!(
            format_elapsed("2026-01-21T10:00:00Z", "2026-01-21T10:00:00.25Z", 1),
            "0.3s"
        );
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(
            format_elapsed("2026-01-21T10:00:00Z", "2026-01-21T10:00:12.5Z", 1),
            "12.5s"
        );
        assert_eq!(
            format_elapsed("2026-01-21T10:00:00Z", "2026-01-21T10:00:00Z", 2),
            "0.00s"
        );
        assert_eq!(format_elapsed("bogus", "2026-01-21T10:00:00Z", 1), "N/A");
    }
}
