//! Interval algebra for temporary exposure keys
//!
//! A TEK is valid for a contiguous range of 10-minute UNIX-epoch windows
//! ("intervals"), 144 per UTC day. This module converts between wall time
//! and interval numbers and provides the day arithmetic used for
//! symptom-onset deltas.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Length of a single interval window.
pub const INTERVAL_LENGTH: Duration = Duration::from_secs(600);

/// Number of intervals in one UTC day.
pub const INTERVALS_PER_DAY: i32 = 144;

/// Minimum allowed rolling period for a key.
pub const MIN_INTERVAL_COUNT: i32 = 1;

/// Maximum allowed rolling period for a key (one full day).
pub const MAX_INTERVAL_COUNT: i32 = 144;

const INTERVAL_SECONDS: i64 = 600;
const DAY_SECONDS: i64 = 86_400;

fn datetime_at(unix: i64) -> DateTime<Utc> {
    // In range for any i32 interval number; chrono covers well past year 9999.
    Utc.timestamp_opt(unix, 0)
        .single()
        .expect("unix timestamp within chrono range")
}

/// Returns the interval number containing the given time.
///
/// `interval_number(t) = floor(t_unix / 600)`.
pub fn interval_number(t: DateTime<Utc>) -> i32 {
    t.timestamp().div_euclid(INTERVAL_SECONDS) as i32
}

/// Returns the start time of the given interval number.
///
/// Inverse of [`interval_number`] for times aligned to a 10-minute
/// boundary.
pub fn time_for_interval(interval: i32) -> DateTime<Utc> {
    datetime_at(i64::from(interval) * INTERVAL_SECONDS)
}

/// Rounds `t` down to a multiple of `window`.
///
/// Used to bucket `created_at` timestamps so that concurrently processed
/// batches within one window share a timestamp, keeping export ordering
/// deterministic.
pub fn truncate_window(t: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let secs = window.as_secs() as i64;
    if secs <= 0 {
        return t;
    }
    let ts = t.timestamp();
    datetime_at(ts - ts.rem_euclid(secs))
}

/// Returns the number of whole UTC days from interval `a` to interval `b`.
///
/// The division rounds toward negative infinity so that day deltas are
/// symmetric for times on either side of a midnight boundary, even when
/// the two intervals differ by a non-multiple of 144.
pub fn days_between_intervals(a: i32, b: i32) -> i32 {
    (i64::from(b) - i64::from(a)).div_euclid(i64::from(INTERVALS_PER_DAY)) as i32
}

/// Truncates `t` to midnight UTC.
pub fn utc_midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    let ts = t.timestamp();
    datetime_at(ts - ts.rem_euclid(DAY_SECONDS))
}

/// Returns `t` minus the given number of days.
pub fn sub_days(t: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    t - chrono::Duration::days(i64::from(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_number_round_trip() {
        // Time to interval is lossy, so truncate to the start of a window.
        let now = truncate_window(Utc::now(), INTERVAL_LENGTH);
        let interval = interval_number(now);
        assert_eq!(time_for_interval(interval), now);
    }

    #[test]
    fn test_interval_number_known_value() {
        let t = Utc.with_ymd_and_hms(2020, 2, 29, 11, 15, 1).unwrap();
        assert_eq!(interval_number(t), (t.timestamp() / 600) as i32);
        // 11:15:01 is inside the 11:10-11:20 window.
        assert_eq!(
            time_for_interval(interval_number(t)),
            Utc.with_ymd_and_hms(2020, 2, 29, 11, 10, 0).unwrap()
        );
    }

    #[test]
    fn test_truncate_window() {
        let t = Utc.with_ymd_and_hms(2020, 3, 1, 10, 43, 21).unwrap();
        assert_eq!(
            truncate_window(t, Duration::from_secs(3600)),
            Utc.with_ymd_and_hms(2020, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            truncate_window(t, Duration::from_secs(60)),
            Utc.with_ymd_and_hms(2020, 3, 1, 10, 43, 0).unwrap()
        );
    }

    #[test]
    fn test_utc_midnight() {
        let t = Utc.with_ymd_and_hms(2020, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(
            utc_midnight(t),
            Utc.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_days_between_intervals() {
        // Everything is based on midnight UTC, so start there.
        let now = utc_midnight(Utc::now());
        let onset = interval_number(now);

        let cases: Vec<(&str, i64, i32)> = vec![
            ("exact_match", 0, 0),
            ("next_day", 24, 1),
            ("next_day_round_down", 35, 1),
            ("next_day_round_down_2", 37, 1),
            ("previous_day", -24, -1),
            ("previous_day_round_down", -25, -2),
            ("previous_day_round_up", -47, -2),
            ("multiple_days", 8 * 24 + 2, 8),
        ];

        for (name, hours, want) in cases {
            let check = interval_number(now + chrono::Duration::hours(hours));
            assert_eq!(
                days_between_intervals(onset, check),
                want,
                "case {name} failed"
            );
        }
    }

    #[test]
    fn test_day_delta_symmetry() {
        let now = utc_midnight(Utc::now());
        let a = interval_number(now);
        let b = interval_number(now + chrono::Duration::days(3));
        for k in [-2i32, 0, 5] {
            let shift = k * INTERVALS_PER_DAY;
            assert_eq!(
                days_between_intervals(a, b),
                -days_between_intervals(b + shift, a + shift)
            );
        }
    }

    #[test]
    fn test_sub_days() {
        let t = Utc.with_ymd_and_hms(2020, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(
            sub_days(t, 2),
            Utc.with_ymd_and_hms(2020, 2, 28, 10, 0, 0).unwrap()
        );
    }
}
