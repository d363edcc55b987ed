use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Minutes in a day; valid minute-of-day offsets are `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: u16 = 1440;

/// A daily recurring active window, expressed in minutes since midnight.
///
/// When `start_minute < end_minute` the window is `[start, end]`, inclusive on
/// both ends. When `start_minute >= end_minute` the window wraps midnight and
/// is active for `minute >= start OR minute <= end`. The degenerate
/// `start == end` case is treated as wrapped, i.e. always active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Schedule {
    pub start_minute: u16,
    pub end_minute: u16,
}

impl Schedule {
    /// Create a schedule, validating both offsets
    pub fn new(start_minute: u16, end_minute: u16) -> Result<Self, PolicyError> {
        validate_minute(start_minute)?;
        validate_minute(end_minute)?;
        Ok(Self {
            start_minute,
            end_minute,
        })
    }

    /// Parse a schedule from a pair of `HH:MM` clock strings
    pub fn parse(start: &str, end: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            start_minute: parse_clock(start)?,
            end_minute: parse_clock(end)?,
        })
    }

    /// Whether the window is active at the given minute of the day
    pub fn is_active(&self, minute_of_day: u16) -> Result<bool, PolicyError> {
        validate_minute(minute_of_day)?;

        if self.start_minute < self.end_minute {
            Ok(self.start_minute <= minute_of_day && minute_of_day <= self.end_minute)
        } else {
            Ok(minute_of_day >= self.start_minute || minute_of_day <= self.end_minute)
        }
    }

    /// Whether the window crosses midnight
    pub fn wraps_midnight(&self) -> bool {
        self.start_minute >= self.end_minute
    }

    /// Render as `HH:MM - HH:MM` for listings
    pub fn display(&self) -> String {
        format!(
            "{} - {}",
            format_clock(self.start_minute),
            format_clock(self.end_minute)
        )
    }
}

/// Minute-of-day for a wall clock reading, in the reading's own timezone
pub fn minute_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> u16 {
    (now.hour() * 60 + now.minute()) as u16
}

fn validate_minute(minute: u16) -> Result<(), PolicyError> {
    if minute >= MINUTES_PER_DAY {
        return Err(PolicyError::invalid_time(format!(
            "minute of day {minute} out of range (expected 0..={})",
            MINUTES_PER_DAY - 1
        )));
    }
    Ok(())
}

fn parse_clock(value: &str) -> Result<u16, PolicyError> {
    let (hours, minutes) = value
        .split_once(':')
        .ok_or_else(|| PolicyError::invalid_time(format!("expected HH:MM, got '{value}'")))?;

    let hours: u16 = hours
        .parse()
        .map_err(|_| PolicyError::invalid_time(format!("bad hour in '{value}'")))?;
    let minutes: u16 = minutes
        .parse()
        .map_err(|_| PolicyError::invalid_time(format!("bad minute in '{value}'")))?;

    if hours > 23 || minutes > 59 {
        return Err(PolicyError::invalid_time(format!(
            "clock value '{value}' out of range"
        )));
    }

    Ok(hours * 60 + minutes)
}

fn format_clock(minute_of_day: u16) -> String {
    format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60)
}
