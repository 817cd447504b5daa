use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::core::lock::lock_mutex;

/// `YYYY-MM-DD` top level (day) folder.
pub const DT_ROOT_FORMAT: &str = "%Y-%m-%d";
/// `YYYY-MM-DD/HH/MM` minute folder, relative to the camera root.
pub const DT_PATH_FORMAT: &str = "%Y-%m-%d/%H/%M";
/// Canonical 14 digit timestamp used in headers and motion marks.
pub const DT_WEB_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of "now" for everything that looks at the segment tree.
///
/// Recordings are named in local wall clock time (ffmpeg `-strftime`), so
/// the clock hands out naive local timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays.
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn at(datetime: &str) -> Option<Self> {
        parse_web_datetime(datetime).map(Self::new)
    }

    pub fn set(&self, now: NaiveDateTime) {
        *lock_mutex(&self.now, "timestamp.fixed_clock.set") = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = lock_mutex(&self.now, "timestamp.fixed_clock.advance");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *lock_mutex(&self.now, "timestamp.fixed_clock.now")
    }
}

pub fn minute_folder(at: NaiveDateTime) -> String {
    at.format(DT_PATH_FORMAT).to_string()
}

pub fn day_folder(at: NaiveDate) -> String {
    at.format(DT_ROOT_FORMAT).to_string()
}

pub fn web_datetime(at: NaiveDateTime) -> String {
    at.format(DT_WEB_FORMAT).to_string()
}

/// Parses a `YYYY-MM-DD/HH/MM` folder back to the start of that minute.
pub fn parse_minute_folder(folder: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{}/00", folder), "%Y-%m-%d/%H/%M/%S").ok()
}

/// Parses a day folder name to its midnight.
pub fn parse_day_folder(folder: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(folder, DT_ROOT_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses a strict 14 digit `YYYYMMDDHHMMSS` value.
pub fn parse_web_datetime(value: &str) -> Option<NaiveDateTime> {
    if !is_web_datetime(value) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, DT_WEB_FORMAT).ok()
}

pub fn is_web_datetime(value: &str) -> bool {
    value.len() == 14 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Shifts a minute folder by a signed number of seconds.
pub fn shift_minute_folder(folder: &str, seconds: i64) -> Option<String> {
    parse_minute_folder(folder).map(|t| minute_folder(t + Duration::seconds(seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_folder_roundtrip() {
        let t = parse_web_datetime("20240110123456").unwrap();
        let folder = minute_folder(t);
        assert_eq!(folder, "2024-01-10/12/34");
        assert_eq!(
            parse_minute_folder(&folder).unwrap(),
            parse_web_datetime("20240110123400").unwrap()
        );
    }

    #[test]
    fn test_web_datetime_rejects_malformed() {
        assert!(parse_web_datetime("2024011012345").is_none());
        assert!(parse_web_datetime("2024011012345x").is_none());
        assert!(parse_web_datetime("20241310123456").is_none());
        assert!(parse_web_datetime("").is_none());
    }

    #[test]
    fn test_shift_minute_folder_crosses_day() {
        assert_eq!(
            shift_minute_folder("2024-01-10/23/59", 60).as_deref(),
            Some("2024-01-11/00/00")
        );
        assert_eq!(
            shift_minute_folder("2024-01-10/00/00", -3600).as_deref(),
            Some("2024-01-09/23/00")
        );
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::at("20240110120000").unwrap();
        clock.advance(Duration::seconds(31));
        assert_eq!(web_datetime(clock.now()), "20240110120031");
    }
}
