//! Allocation-light UTC timestamp formatting.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DAY_NAMES: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Broken-down UTC time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Civil {
    year: u64,
    /// 1-based.
    month: u64,
    /// 1-based.
    day: u64,
    hour: u64,
    minute: u64,
    second: u64,
    /// Days since the epoch (1970-01-01 was a Thursday).
    days: u64,
}

impl Civil {
    fn from_secs(secs: u64) -> Self {
        let days = secs / 86400;
        let day_secs = secs % 86400;

        let mut year = 1970u64;
        let mut remaining = days;
        loop {
            let year_days = if is_leap_year(year) { 366 } else { 365 };
            if remaining < year_days {
                break;
            }
            remaining -= year_days;
            year += 1;
        }

        let month_days: [u64; 12] = if is_leap_year(year) {
            [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
        } else {
            [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
        };

        let mut month = 0u64;
        for &days_in_month in &month_days {
            if remaining < days_in_month {
                break;
            }
            remaining -= days_in_month;
            month += 1;
        }

        Self {
            year,
            month: month + 1,
            day: remaining + 1,
            hour: day_secs / 3600,
            minute: (day_secs % 3600) / 60,
            second: day_secs % 60,
            days,
        }
    }
}

fn since_epoch(time: SystemTime) -> Duration {
    time.duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Format a time as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(time: SystemTime) -> String {
    let t = Civil::from_secs(since_epoch(time).as_secs());
    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        DAY_NAMES[(t.days % 7) as usize],
        t.day,
        MONTH_NAMES[(t.month - 1) as usize],
        t.year,
        t.hour,
        t.minute,
        t.second
    )
}

/// Format a time as ISO 8601 with milliseconds (`2024-12-28T15:04:05.123Z`).
pub fn iso8601(time: SystemTime) -> String {
    let since = since_epoch(time);
    let t = Civil::from_secs(since.as_secs());
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        t.year,
        t.month,
        t.day,
        t.hour,
        t.minute,
        t.second,
        since.subsec_millis()
    )
}

/// Current time as ISO 8601.
#[inline]
pub fn iso8601_now() -> String {
    iso8601(SystemTime::now())
}

#[inline]
const fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
