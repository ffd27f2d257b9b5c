//! Julian-date helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian date of the Unix epoch (1970-01-01T00:00:00Z).
pub const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Tolerance used when comparing Julian dates (days).
pub const JD_TOLERANCE: f64 = 1e-6;

/// Converts seconds to days.
#[inline]
pub fn seconds_to_days(seconds: f64) -> f64 {
    seconds / SECONDS_PER_DAY
}

/// Converts days to seconds.
#[inline]
pub fn days_to_seconds(days: f64) -> f64 {
    days * SECONDS_PER_DAY
}

/// Length of `[jd_start, jd_end)` in seconds, rounded to whole milliseconds.
///
/// A Julian date near the current epoch resolves to about 40 µs, so the raw
/// difference carries sub-millisecond noise that would leak into durations.
pub fn jd_span_seconds(jd_start: f64, jd_end: f64) -> f64 {
    (days_to_seconds(jd_end - jd_start) * 1000.0).round() / 1000.0
}

/// Converts a Julian date to a UTC timestamp (millisecond precision).
///
/// Returns `None` for values outside chrono's representable range.
pub fn jd_to_datetime(jd: f64) -> Option<DateTime<Utc>> {
    if !jd.is_finite() {
        return None;
    }
    let millis = (days_to_seconds(jd - JD_UNIX_EPOCH) * 1000.0).round();
    DateTime::from_timestamp_millis(millis as i64)
}

/// Renders a Julian date as an ISO-8601 UTC string, e.g. `2024-03-01T22:15:00Z`.
pub fn jd_to_iso8601(jd: f64) -> Option<String> {
    jd_to_datetime(jd).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        assert_eq!(
            jd_to_iso8601(JD_UNIX_EPOCH).as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_j2000() {
        // J2000.0 = 2000-01-01T12:00:00 TT; treated as UTC here.
        assert_eq!(
            jd_to_iso8601(2_451_545.0).as_deref(),
            Some("2000-01-01T12:00:00Z")
        );
    }

    #[test]
    fn test_non_finite() {
        assert!(jd_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn test_jd_span_is_exact_for_whole_hours() {
        let jd0 = 2_460_000.5;
        assert_eq!(jd_span_seconds(jd0, jd0 + 1.0 / 24.0), 3600.0);
        assert_eq!(jd_span_seconds(jd0, jd0 + 0.25), 21_600.0);
        assert_eq!(jd_span_seconds(jd0, jd0 + 7.0 / 24.0), 25_200.0);
    }

    #[test]
    fn test_second_day_round_trip() {
        assert!((days_to_seconds(seconds_to_days(3600.0)) - 3600.0).abs() < 1e-9);
    }
}
