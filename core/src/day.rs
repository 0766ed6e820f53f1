use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DAY_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Time of day at which a new logging day begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartOfDay {
    hour: u32,
    minute: u32,
}

impl StartOfDay {
    pub const MIDNIGHT: StartOfDay = StartOfDay { hour: 0, minute: 0 };

    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidInput(format!(
                "Start of day must be between 00:00 and 23:59 (got {hour:02}:{minute:02})"
            )));
        }
        Ok(Self { hour, minute })
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        self.hour
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        self.minute
    }

    fn offset(self) -> Duration {
        Duration::hours(i64::from(self.hour)) + Duration::minutes(i64::from(self.minute))
    }

    /// Subjective day for a wall-clock timestamp: `date_of(t - boundary)`.
    #[must_use]
    pub fn consumed_day(self, at: NaiveDateTime) -> NaiveDate {
        (at - self.offset()).date()
    }

    /// Split a timestamp into its `(consumed_day, consumed_time)` keys.
    #[must_use]
    pub fn split(self, at: NaiveDateTime) -> (String, String) {
        let day = self.consumed_day(at).format(DAY_FORMAT).to_string();
        let time = at.time().format(TIME_FORMAT).to_string();
        (day, time)
    }

    /// Wall-clock timestamp of `time` within the subjective day `day`.
    ///
    /// Times earlier than the boundary belong to the calendar day after `day`.
    #[must_use]
    pub fn consumed_at(self, day: NaiveDate, time: NaiveTime) -> NaiveDateTime {
        let boundary = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default();
        let date = if time < boundary {
            day + Duration::days(1)
        } else {
            day
        };
        date.and_time(time)
    }
}

impl fmt::Display for StartOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for StartOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let time = NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|_| Error::InvalidInput(format!("Invalid start of day '{s}' (expected HH:MM)")))?;
        StartOfDay::new(time.hour(), time.minute())
    }
}

pub fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DAY_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("Invalid day '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn test_boundary_before_start_belongs_to_previous_day() {
        let sod = StartOfDay::new(3, 0).unwrap();
        let day = sod.consumed_day(at("2023-02-01T02:30:00"));
        assert_eq!(day.format(DAY_FORMAT).to_string(), "2023-01-31");
    }

    #[test]
    fn test_boundary_after_start_belongs_to_same_day() {
        let sod = StartOfDay::new(3, 0).unwrap();
        let day = sod.consumed_day(at("2023-02-01T03:30:00"));
        assert_eq!(day.format(DAY_FORMAT).to_string(), "2023-02-01");
    }

    #[test]
    fn test_midnight_is_calendar_day() {
        let day = StartOfDay::MIDNIGHT.consumed_day(at("2023-02-01T00:00:00"));
        assert_eq!(day.format(DAY_FORMAT).to_string(), "2023-02-01");
    }

    #[test]
    fn test_split_keeps_wall_clock_time() {
        let sod = StartOfDay::new(3, 0).unwrap();
        let (day, time) = sod.split(at("2023-02-01T02:30:15"));
        assert_eq!(day, "2023-01-31");
        assert_eq!(time, "02:30:15");
    }

    #[test]
    fn test_consumed_at_inverts_split() {
        let sod = StartOfDay::new(3, 0).unwrap();
        for original in [at("2023-02-01T02:30:15"), at("2023-02-01T16:05:00")] {
            let day = sod.consumed_day(original);
            assert_eq!(sod.consumed_at(day, original.time()), original);
        }
    }

    #[test]
    fn test_parse_and_display() {
        let sod: StartOfDay = "03:30".parse().unwrap();
        assert_eq!(sod.hour(), 3);
        assert_eq!(sod.minute(), 30);
        assert_eq!(sod.to_string(), "03:30");
        assert!("25:00".parse::<StartOfDay>().is_err());
        assert!("noon".parse::<StartOfDay>().is_err());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(StartOfDay::new(24, 0).is_err());
        assert!(StartOfDay::new(0, 60).is_err());
    }
}
