//! UTC wall-clock scheduling math.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};

/// The next moment strictly after `now` at which the given UTC HH:MM
/// occurs.
///
/// A run finishing before its own start time can therefore never
/// re-trigger on the same day. Out-of-range components fall back to
/// midnight; the schedule table's CHECK constraints keep them in range.
pub fn next_occurrence(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let candidate = now.date_naive().and_time(time).and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + TimeDelta::days(1)
    }
}
